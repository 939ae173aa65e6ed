//! Cache key construction.

use std::fmt;

/// Cache key for a proxied response: `METHOD:path`.
///
/// The path is taken verbatim, query string included; trailing slashes and
/// parameter order are significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(method: &str, path: &str) -> Self {
        Self(format!("{method}:{path}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
