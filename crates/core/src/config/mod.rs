//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (EDGESIDE_*)
//! 2. TOML config file (if EDGESIDE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// One entry of the ordered route table.
///
/// ```toml
/// [[routes]]
/// patterns = ["/foo*", "/bar"]
/// backend = "http://localhost:3000"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Glob patterns matched against the request path (`*` and `?` wildcards).
    pub patterns: Vec<String>,

    /// Base address of the backend serving these paths.
    pub backend: String,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (EDGESIDE_*)
/// 2. TOML config file (if EDGESIDE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Socket address the edge listens on.
    ///
    /// Set via EDGESIDE_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Ordered route table; the first matching entry wins.
    #[serde(default = "default_routes")]
    pub routes: Vec<RouteConfig>,

    /// Maximum number of cached responses kept in memory.
    ///
    /// Set via EDGESIDE_CACHE_CAPACITY environment variable.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// User-Agent string for origin and include requests.
    ///
    /// Set via EDGESIDE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Connect timeout and per-read idle timeout for HTTP requests, in milliseconds.
    ///
    /// Set via EDGESIDE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Longest ESI marker held back across chunk boundaries before it is
    /// passed through as malformed.
    ///
    /// Set via EDGESIDE_MAX_MARKER_BYTES environment variable.
    #[serde(default = "default_max_marker_bytes")]
    pub max_marker_bytes: usize,

    /// Depth of the bounded queue between the splice task and the client, in chunks.
    ///
    /// Set via EDGESIDE_STREAM_BUFFER environment variable.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,

    /// Largest response body, in bytes, that is recorded for the cache.
    /// Bigger responses still stream to the client but are not stored.
    ///
    /// Set via EDGESIDE_MAX_ENTRY_BYTES environment variable.
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: usize,

    /// How often expired cache entries are swept, in milliseconds.
    ///
    /// Set via EDGESIDE_SWEEP_INTERVAL_MS environment variable.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".into()
}

fn default_routes() -> Vec<RouteConfig> {
    vec![RouteConfig { patterns: vec!["/*".into()], backend: "http://localhost:3000".into() }]
}

fn default_cache_capacity() -> usize {
    1024
}

fn default_user_agent() -> String {
    "edgeside/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_marker_bytes() -> usize {
    2048
}

fn default_stream_buffer() -> usize {
    16
}

fn default_max_entry_bytes() -> usize {
    4 * 1024 * 1024
}

fn default_sweep_interval_ms() -> u64 {
    30_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            routes: default_routes(),
            cache_capacity: default_cache_capacity(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_marker_bytes: default_max_marker_bytes(),
            stream_buffer: default_stream_buffer(),
            max_entry_bytes: default_max_entry_bytes(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Interval between expired-entry sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `EDGESIDE_`
    /// 2. TOML file from `EDGESIDE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("EDGESIDE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("EDGESIDE_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].patterns, vec!["/*".to_string()]);
        assert_eq!(config.routes[0].backend, "http://localhost:3000");
        assert_eq!(config.cache_capacity, 1024);
        assert_eq!(config.user_agent, "edgeside/0.1");
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.max_marker_bytes, 2048);
        assert_eq!(config.stream_buffer, 16);
        assert_eq!(config.max_entry_bytes, 4 * 1024 * 1024);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
        assert_eq!(config.sweep_interval(), Duration::from_millis(30_000));
    }

    #[test]
    fn test_load_from_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "edgeside.toml",
                r#"
                listen_addr = "127.0.0.1:9000"
                cache_capacity = 8

                [[routes]]
                patterns = ["/foobar*"]
                backend = "http://fragments:3001"

                [[routes]]
                patterns = ["/*"]
                backend = "http://origin:3000"
                "#,
            )?;
            jail.set_env("EDGESIDE_CONFIG_FILE", "edgeside.toml");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.listen_addr, "127.0.0.1:9000");
            assert_eq!(config.cache_capacity, 8);
            assert_eq!(config.routes.len(), 2);
            assert_eq!(config.routes[0].backend, "http://fragments:3001");
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("edgeside.toml", "timeout_ms = 5000")?;
            jail.set_env("EDGESIDE_CONFIG_FILE", "edgeside.toml");
            jail.set_env("EDGESIDE_TIMEOUT_MS", "7000");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.timeout_ms, 7000);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("EDGESIDE_CACHE_CAPACITY", "0");
            let result = AppConfig::load();
            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_capacity"));
            Ok(())
        });
    }
}
