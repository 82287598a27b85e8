//! # Sync Configuration
//!
//! Configuration for the sync engine, loaded in layers: defaults, then a
//! TOML file, then `MIRROR_*` environment variables.
//!
//! ## Configuration File Format
//! ```toml
//! # mirror.toml
//! [remote]
//! base_url = "https://example.bitrix24.com/rest/1/token/"
//! count_timeout_secs = 5
//! fetch_timeout_secs = 120
//!
//! [engine]
//! batch_size = 50
//! max_workers = 8
//! slice_retry_limit = 3
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Remote Settings
// =============================================================================

/// Settings for the remote REST source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Base URL of the remote REST endpoint, with trailing webhook path
    /// (e.g. `https://host/rest/1/token/`).
    #[serde(default)]
    pub base_url: String,

    /// Timeout for count probes (seconds). Counts are cheap; keep this
    /// short.
    #[serde(default = "default_count_timeout")]
    pub count_timeout_secs: u64,

    /// Timeout for page fetches (seconds). Full-projection pages can be
    /// large.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

fn default_count_timeout() -> u64 {
    5
}

fn default_fetch_timeout() -> u64 {
    120
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            base_url: String::new(),
            count_timeout_secs: default_count_timeout(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

impl RemoteSettings {
    /// Count-probe timeout as a `Duration`.
    pub fn count_timeout(&self) -> Duration {
        Duration::from_secs(self.count_timeout_secs)
    }

    /// Page-fetch timeout as a `Duration`.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

// =============================================================================
// Engine Settings
// =============================================================================

/// Settings for the sync coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Records per page fetch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Concurrent page fetches per round.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Consecutive dry rounds at one cursor position before the slice is
    /// abandoned and recorded as a gap.
    #[serde(default = "default_slice_retry_limit")]
    pub slice_retry_limit: u32,
}

fn default_batch_size() -> usize {
    50
}

fn default_max_workers() -> usize {
    8
}

fn default_slice_retry_limit() -> u32 {
    3
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            batch_size: default_batch_size(),
            max_workers: default_max_workers(),
            slice_retry_limit: default_slice_retry_limit(),
        }
    }
}

impl EngineSettings {
    /// Pending-batch size that forces a flush.
    pub fn flush_threshold(&self) -> usize {
        self.batch_size * 2
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote source settings.
    #[serde(default)]
    pub remote: RemoteSettings,

    /// Coordinator settings.
    #[serde(default)]
    pub engine: EngineSettings,
}

impl SyncConfig {
    /// Creates a config with defaults (no remote URL configured).
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (mirror.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Validates the configuration.
    ///
    /// An empty base URL passes here; it is rejected when an HTTP client
    /// is actually constructed, so engine tests can run with no remote
    /// configured.
    pub fn validate(&self) -> SyncResult<()> {
        let url = self.remote.base_url.trim();
        if !url.is_empty() && !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(SyncError::InvalidUrl(format!(
                "Remote URL must start with http:// or https://, got: {}",
                url
            )));
        }

        if self.engine.batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }

        if self.engine.max_workers == 0 {
            return Err(SyncError::InvalidConfig(
                "max_workers must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("MIRROR_REMOTE_URL") {
            debug!(url = %url, "Overriding remote URL from environment");
            self.remote.base_url = url;
        }

        if let Ok(secs) = std::env::var("MIRROR_COUNT_TIMEOUT_SECS") {
            if let Ok(v) = secs.parse() {
                self.remote.count_timeout_secs = v;
            }
        }

        if let Ok(secs) = std::env::var("MIRROR_FETCH_TIMEOUT_SECS") {
            if let Ok(v) = secs.parse() {
                self.remote.fetch_timeout_secs = v;
            }
        }

        if let Ok(size) = std::env::var("MIRROR_BATCH_SIZE") {
            if let Ok(v) = size.parse() {
                debug!(batch_size = v, "Overriding batch size from environment");
                self.engine.batch_size = v;
            }
        }

        if let Ok(workers) = std::env::var("MIRROR_MAX_WORKERS") {
            if let Ok(v) = workers.parse() {
                self.engine.max_workers = v;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "bx-mirror", "mirror")
            .map(|dirs| dirs.config_dir().join("mirror.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.engine.batch_size, 50);
        assert_eq!(config.engine.max_workers, 8);
        assert_eq!(config.engine.flush_threshold(), 100);
        assert_eq!(config.remote.count_timeout_secs, 5);
        assert_eq!(config.remote.fetch_timeout_secs, 120);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();
        assert!(config.validate().is_ok());

        config.remote.base_url = "ftp://wrong".into();
        assert!(config.validate().is_err());

        config.remote.base_url = "https://example.bitrix24.com/rest/1/abc/".into();
        assert!(config.validate().is_ok());

        config.engine.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_parsing() {
        let config: SyncConfig = toml::from_str(
            r#"
            [remote]
            base_url = "https://example.bitrix24.com/rest/1/abc/"

            [engine]
            batch_size = 25
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.batch_size, 25);
        // Unspecified fields keep their defaults.
        assert_eq!(config.engine.max_workers, 8);
        assert_eq!(config.remote.fetch_timeout_secs, 120);
    }
}
