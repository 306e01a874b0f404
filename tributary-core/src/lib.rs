//! # Tributary Core
//!
//! Core types, errors, and traits for the Tributary data aggregator.
//!
//! This crate provides the foundational building blocks used by all other Tributary crates:
//!
//! - **Types**: Typed upstream results (weather, news, quotes) and the aggregated composite
//! - **Errors**: The fetch/aggregate error taxonomy
//! - **Constants**: Cache TTLs, retry and rate-limit defaults
//! - **Traits**: The [`UpstreamSource`] seam between orchestration and HTTP
//!
//! ## Example
//!
//! ```rust
//! use tributary_core::{cache_key, Resource};
//!
//! let key = cache_key(Resource::Weather, &["London"]);
//! assert!(key.starts_with("weather/"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod key;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{Result, TransientError, TributaryError};
pub use key::cache_key;
pub use traits::UpstreamSource;
pub use types::*;
