//! TTL cache for Tributary.
//!
//! In-memory key-value store with read-time expiry and a background sweeper
//! that can be started and stopped explicitly.

mod cache;

pub use cache::{CacheConfig, CacheManager, CacheStats};
