//! Configuration loading.
//!
//! Configuration is read from TOML with the following resolution order:
//! 1. An explicit path (e.g. `--config <path>`)
//! 2. `~/.config/portray/config.toml` (user)
//! 3. Built-in defaults
//!
//! Every field is optional. The session token is never read from the file;
//! it comes from the `PORTRAY_SESSION_TOKEN` environment variable.
//!
//! ```toml
//! [profiles]
//! max_entries = 1000
//! time_to_idle_secs = 600
//!
//! [avatars]
//! time_to_live_secs = 36000
//!
//! [http]
//! timeout_secs = 5
//!
//! [pool]
//! worker_threads = 4
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::cache::CacheConfig;
use crate::profile::client::DEFAULT_IDENTITY_URL;
use crate::profile::portrait::DEFAULT_RENDERER_URL;
use crate::{PortrayError, Result, version};

/// Environment variable holding the identity service session token.
pub const SESSION_TOKEN_ENV: &str = "PORTRAY_SESSION_TOKEN";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortrayConfig {
    #[serde(default)]
    pub profiles: CacheSection,
    #[serde(default)]
    pub avatars: CacheSection,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub pool: PoolConfig,
}

/// Overrides for one cache's policy. Unset fields keep that cache's
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    #[serde(default)]
    pub max_entries: Option<u64>,
    #[serde(default)]
    pub time_to_live_secs: Option<u64>,
    #[serde(default)]
    pub time_to_idle_secs: Option<u64>,
}

impl CacheSection {
    /// Apply these overrides on top of `defaults`.
    pub fn apply(&self, mut defaults: CacheConfig) -> CacheConfig {
        if let Some(n) = self.max_entries {
            defaults.max_entries = n;
        }
        if let Some(secs) = self.time_to_live_secs {
            defaults.time_to_live = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = self.time_to_idle_secs {
            defaults.time_to_idle = Some(Duration::from_secs(secs));
        }
        defaults
    }
}

/// Outbound HTTP settings shared by the identity and renderer clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Identity service base URL.
    #[serde(default = "default_identity_url")]
    pub identity_url: String,
    /// Portrait renderer base URL.
    #[serde(default = "default_renderer_url")]
    pub renderer_url: String,
    /// Per-request timeout in seconds (default: 5).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// `User-Agent` header (default: `portray/<version>`).
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Bearer token for the identity service.
    #[serde(skip)]
    pub session_token: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            identity_url: default_identity_url(),
            renderer_url: default_renderer_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: None,
            session_token: None,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn user_agent(&self) -> String {
        self.user_agent.clone().unwrap_or_else(version::user_agent)
    }

    /// Fill the session token from [`SESSION_TOKEN_ENV`] unless one is set.
    pub fn with_env_token(mut self) -> Self {
        if self.session_token.is_none() {
            self.session_token = std::env::var(SESSION_TOKEN_ENV)
                .ok()
                .filter(|token| !token.trim().is_empty());
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(PortrayError::Configuration(
                "http.timeout_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_identity_url() -> String {
    DEFAULT_IDENTITY_URL.to_string()
}

fn default_renderer_url() -> String {
    DEFAULT_RENDERER_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

/// Worker pool sizing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// Threads of a dedicated pool. Unset: share the caller's runtime.
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl PortrayConfig {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided; must exist)
    /// 2. `~/.config/portray/config.toml`
    /// 3. Defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::resolve_config_path(explicit_path)? {
            Some(path) => {
                debug!(path = %path.display(), "loading config");
                let content = fs::read_to_string(&path).map_err(|e| {
                    PortrayError::Configuration(format!(
                        "Failed to read config file {path:?}: {e}"
                    ))
                })?;
                toml::from_str::<Self>(&content).map_err(|e| {
                    PortrayError::Configuration(format!(
                        "Failed to parse config file {path:?}: {e}"
                    ))
                })?
            }
            None => Self::default(),
        };
        config.http = config.http.with_env_token();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string. The environment is not
    /// consulted.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| PortrayError::Configuration(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Effective profile cache policy.
    pub fn profile_cache(&self) -> CacheConfig {
        self.profiles.apply(crate::profile::cache::default_config())
    }

    /// Effective avatar cache policy.
    pub fn avatar_cache(&self) -> CacheConfig {
        self.avatars.apply(crate::avatar::default_config())
    }

    /// Check every section. Called by the loaders.
    pub fn validate(&self) -> Result<()> {
        self.profile_cache().validate()?;
        self.avatar_cache().validate()?;
        self.http.validate()?;
        if self.pool.worker_threads == Some(0) {
            return Err(PortrayError::Configuration(
                "pool.worker_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(PortrayError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(dir) = dirs::config_dir() {
            let user_config = dir.join("portray").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        Ok(None)
    }
}
