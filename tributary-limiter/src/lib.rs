//! Sliding-window admission control.
//!
//! - [`RateLimiter`]: one window shared by every caller
//! - [`PerEndpointRateLimiter`]: one window per caller-supplied key
//!
//! Both offer a hard `is_allowed` check and a cooperative `wait_if_needed`
//! that delays the caller until a slot frees up.

mod per_key;
mod window;

pub use per_key::PerEndpointRateLimiter;
pub use window::{RateLimitConfig, RateLimiter};
