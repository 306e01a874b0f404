//! Cache-key derivation.

use crate::types::Resource;

/// Derives the cache key for a resource and its request parameters.
///
/// Parameters are trimmed and length-prefixed, so two different parameter
/// lists never map to the same key even when they contain the separator.
///
/// ```rust
/// use tributary_core::{cache_key, Resource};
///
/// assert_eq!(cache_key(Resource::Stocks, &[" AAPL "]), "stocks/4:AAPL");
/// ```
pub fn cache_key(resource: Resource, parts: &[&str]) -> String {
    let mut key = String::from(resource.name());
    for part in parts {
        let part = part.trim();
        key.push('/');
        key.push_str(&part.len().to_string());
        key.push(':');
        key.push_str(part);
    }
    key
}
