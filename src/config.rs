//! Configuration management

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before the rest of the process starts.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    pub env_files: Vec<String>,
    /// Key generator configuration
    pub keygen: KeyGenConfig,
    /// Account store configuration
    pub store: StoreConfig,
    /// Development key authority configuration
    pub authority: AuthorityConfig,
}

/// Key generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyGenConfig {
    /// Keys fetched per refill
    pub batch_size: usize,
    /// Where keys come from
    pub source: SourceConfig,
    /// Caller-side retry for key allocation
    pub retry: RetryConfig,
}

impl Default for KeyGenConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            source: SourceConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Kind of key source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// In-process authority
    #[default]
    Local,
    /// Remote authority over HTTP
    Http,
}

/// Key source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Source kind
    pub kind: SourceKind,
    /// Base URL of the remote authority (http only)
    pub url: Option<String>,
    /// Request timeout (http only)
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Generated key length (local only)
    pub key_length: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Local,
            url: None,
            timeout: Duration::from_secs(5),
            key_length: 6,
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries
    pub enabled: bool,
    /// Maximum attempts, the first one included
    pub max_attempts: u32,
    /// Initial backoff
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    /// Maximum backoff
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

/// Account store configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON file holding users and mappings; in-memory when absent
    pub path: Option<PathBuf>,
}

/// Development key authority configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Largest batch a single request may ask for
    pub max_batch: usize,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
            max_batch: 1000,
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be parsed,
    /// or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        // Load from file if provided
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (SHORT_KEYGEN_ prefix)
        figment = figment.merge(Env::prefixed("SHORT_KEYGEN_").split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.store.path = config.store.path.as_deref().map(expand_home);
        config.load_env_files();
        config.validate()?;

        Ok(config)
    }

    /// Reject settings no component could run with.
    pub fn validate(&self) -> Result<()> {
        if self.keygen.batch_size == 0 {
            return Err(Error::InvalidConfiguration(
                "keygen.batch_size must be at least 1".to_string(),
            ));
        }
        if self.keygen.retry.max_attempts == 0 {
            return Err(Error::InvalidConfiguration(
                "keygen.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        match self.keygen.source.kind {
            SourceKind::Http if self.keygen.source.url.is_none() => {
                return Err(Error::InvalidConfiguration(
                    "keygen.source.url is required for the http source".to_string(),
                ));
            }
            SourceKind::Local if self.keygen.source.key_length == 0 => {
                return Err(Error::InvalidConfiguration(
                    "keygen.source.key_length must be at least 1".to_string(),
                ));
            }
            _ => {}
        }
        if self.authority.max_batch == 0 {
            return Err(Error::InvalidConfiguration(
                "authority.max_batch must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let path = expand_home(Path::new(path_str));
            let expanded = path.display();

            if path.exists() {
                match dotenvy::from_path(&path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {expanded}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {expanded}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }
}

/// Replace a leading `~` component with the home directory.
///
/// Paths without one (and `~user` forms) are returned unchanged, as is
/// everything when no home directory is known.
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
