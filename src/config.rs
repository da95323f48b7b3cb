//! Configuration loading and persistence.
//!
//! Handles reading and writing the lightbridge configuration file. The file
//! is optional: defaults cover local development, and every field can be
//! overridden through environment variables, which is how the proxy port is
//! normally set in deployment (`PORT`, matching the original deployment
//! convention, or `LIGHTBRIDGE_PROXY_PORT`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{fs, path::PathBuf, time::Duration};

use crate::proxy::rewrite::{default_overrides, SchemeOverride};

/// Default proxy listen port.
pub const DEFAULT_PROXY_PORT: u16 = 3000;

/// Default cap on inbound proxy request bodies (2 MiB, the original limit).
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Configuration for the lightbridge CLI.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    /// Port the forwarding proxy listens on.
    pub proxy_port: u16,
    /// Per-call timeout for proxied upstream requests, in seconds.
    pub proxy_timeout: u64,
    /// Maximum accepted inbound request body, in bytes.
    pub proxy_body_limit: usize,
    /// Per-call timeout for bridge requests made by the worker, in seconds.
    pub bridge_timeout: u64,
    /// Ordered (prefix, scheme) override table for target rewriting.
    pub scheme_overrides: Vec<SchemeOverride>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proxy_port: DEFAULT_PROXY_PORT,
            proxy_timeout: 30,
            proxy_body_limit: DEFAULT_BODY_LIMIT,
            bridge_timeout: 30,
            scheme_overrides: default_overrides(),
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// `LIGHTBRIDGE_CONFIG_DIR` overrides the platform config dir.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("LIGHTBRIDGE_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("could not determine config directory")?
                .join("lightbridge")
        };
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    ///
    /// A missing or unreadable file falls back to defaults; the overrides are
    /// applied either way.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_default();
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::config_dir()?.join("config.json");
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            anyhow::bail!("config file not found")
        }
    }

    fn apply_env_overrides(&mut self) {
        // PORT is the deployment-facing name; LIGHTBRIDGE_PROXY_PORT wins
        // when both are set.
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.proxy_port = port;
            }
        }
        if let Ok(port) = std::env::var("LIGHTBRIDGE_PROXY_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.proxy_port = port;
            }
        }
        if let Ok(timeout) = std::env::var("LIGHTBRIDGE_PROXY_TIMEOUT") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.proxy_timeout = timeout;
            }
        }
        if let Ok(limit) = std::env::var("LIGHTBRIDGE_BODY_LIMIT") {
            if let Ok(limit) = limit.parse::<usize>() {
                self.proxy_body_limit = limit;
            }
        }
        if let Ok(timeout) = std::env::var("LIGHTBRIDGE_BRIDGE_TIMEOUT") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.bridge_timeout = timeout;
            }
        }
    }

    /// Persists the current configuration to disk.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_dir()?.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)?;

        // Owner read/write only
        #[cfg(unix)]
        fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// Bridge timeout as a [`Duration`].
    #[must_use]
    pub fn bridge_timeout(&self) -> Duration {
        Duration::from_secs(self.bridge_timeout)
    }

    /// Proxy upstream timeout as a [`Duration`].
    #[must_use]
    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::rewrite::Scheme;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.proxy_port, 3000);
        assert_eq!(config.proxy_timeout, 30);
        assert_eq!(config.bridge_timeout, 30);
        assert_eq!(config.proxy_body_limit, 2 * 1024 * 1024);
        assert_eq!(config.scheme_overrides.len(), 1);
        assert_eq!(config.scheme_overrides[0].scheme, Scheme::Http);
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.proxy_port, config.proxy_port);
        assert_eq!(back.scheme_overrides, config.scheme_overrides);
    }

    #[test]
    fn test_save_load_and_env_overrides() {
        // One test owns the config env vars; splitting this up would race
        // under the parallel test runner.
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("LIGHTBRIDGE_CONFIG_DIR", dir.path());
        std::env::remove_var("PORT");
        std::env::remove_var("LIGHTBRIDGE_PROXY_PORT");

        let mut config = Config::default();
        config.proxy_port = 4000;
        config.save().unwrap();
        assert_eq!(Config::load().unwrap().proxy_port, 4000);

        std::env::set_var("PORT", "5001");
        assert_eq!(Config::load().unwrap().proxy_port, 5001);

        // The explicit name wins over the deployment-facing one.
        std::env::set_var("LIGHTBRIDGE_PROXY_PORT", "6001");
        assert_eq!(Config::load().unwrap().proxy_port, 6001);

        std::env::remove_var("PORT");
        std::env::remove_var("LIGHTBRIDGE_PROXY_PORT");
        std::env::remove_var("LIGHTBRIDGE_CONFIG_DIR");
    }

    #[test]
    fn test_override_table_is_data_not_code() {
        // A new HTTP-only upstream is a config edit, not a code change.
        let json = r#"{
            "proxy_port": 9001,
            "proxy_timeout": 5,
            "proxy_body_limit": 1024,
            "bridge_timeout": 10,
            "scheme_overrides": [
                {"prefix": "legacy.internal.example", "scheme": "http"}
            ]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.proxy_port, 9001);
        assert_eq!(config.scheme_overrides[0].prefix, "legacy.internal.example");
        assert_eq!(config.scheme_overrides[0].scheme, Scheme::Http);
    }
}
