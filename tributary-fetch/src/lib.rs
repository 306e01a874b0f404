//! Upstream access for Tributary.
//!
//! - [`RetryingFetcher`]: one logical GET with bounded exponential backoff
//! - [`HttpUpstream`]: weather, news and quote clients built on the fetcher
//! - [`parse`]: validation of raw provider payloads into typed results

pub mod parse;
mod retry;
mod upstream;

pub use retry::{RetryPolicy, RetryingFetcher};
pub use upstream::{HttpUpstream, UpstreamConfig};
