//! # Tributary Aggregator
//!
//! Composes the retrying upstream clients with the TTL cache and the rate
//! limiters. Single-resource requests run one flow; [`Aggregator::fetch_all`]
//! runs the three flows concurrently and succeeds only if all three do.
//!
//! Per resource flow:
//!
//! 1. cache lookup (hit returns immediately)
//! 2. cooperative wait on that upstream's rate limiter
//! 3. fetch through the [`UpstreamSource`](tributary_core::UpstreamSource)
//! 4. store with the resource's TTL
//!
//! Inbound admission runs once per public call, before anything else.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod aggregator;
mod config;

pub use aggregator::Aggregator;
pub use config::{AggregatorConfig, TtlPolicy};
