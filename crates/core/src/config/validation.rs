//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Smallest marker bound that still fits a realistic include tag.
const MIN_MARKER_BYTES: usize = 64;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_capacity`, `stream_buffer` or `max_entry_bytes` is 0
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_marker_bytes` is below 64 bytes or above 1MB
    /// - `user_agent` is empty
    /// - a route has no patterns, a pattern not starting with `/`, or a
    ///   backend that is not an absolute http(s) URL
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid { field: "cache_capacity".into(), reason: "must be greater than 0".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.max_marker_bytes < MIN_MARKER_BYTES {
            return Err(ConfigError::Invalid {
                field: "max_marker_bytes".into(),
                reason: format!("must be at least {MIN_MARKER_BYTES} bytes"),
            });
        }
        if self.max_marker_bytes > 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_marker_bytes".into(), reason: "must not exceed 1MB".into() });
        }

        if self.stream_buffer == 0 {
            return Err(ConfigError::Invalid { field: "stream_buffer".into(), reason: "must be greater than 0".into() });
        }

        if self.max_entry_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_entry_bytes".into(), reason: "must be greater than 0".into() });
        }

        if self.sweep_interval_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "sweep_interval_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        for (index, route) in self.routes.iter().enumerate() {
            let field = format!("routes[{index}]");
            if route.patterns.is_empty() {
                return Err(ConfigError::Invalid { field, reason: "must list at least one pattern".into() });
            }
            if let Some(pattern) = route.patterns.iter().find(|p| !p.starts_with('/')) {
                return Err(ConfigError::Invalid { field, reason: format!("pattern {pattern:?} must start with '/'") });
            }
            match url::Url::parse(&route.backend) {
                Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
                Ok(url) => {
                    return Err(ConfigError::Invalid {
                        field,
                        reason: format!("backend scheme {:?} is not http(s)", url.scheme()),
                    });
                }
                Err(e) => {
                    return Err(ConfigError::Invalid { field, reason: format!("backend {:?}: {e}", route.backend) });
                }
            }
        }

        if self.routes.is_empty() {
            tracing::warn!("No routes configured; every request will be answered with 404");
        }

        Ok(())
    }
}
