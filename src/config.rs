// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates poller timings and gateway settings, provides sensible defaults for the rest

use crate::paths;
use anyhow::{Context, Result};
use pinion_client::ClientConfig;
use pinion_core::PollConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub poller: PollConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for daily log files; the XDG log dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_web_host() -> String {
    "127.0.0.1".to_string()
}

fn default_web_port() -> u16 {
    3978
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. PINION_CONFIG_PATH env var (if set)
    /// 2. ./config.toml (current directory - for development)
    /// 3. ~/.config/pinion/config.toml (XDG config dir)
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var("PINION_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
            tracing::warn!(path = %env_path, "PINION_CONFIG_PATH does not exist, ignoring");
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration from config.toml with environment variable overrides
    /// Searches: PINION_CONFIG_PATH env var, ./config.toml, then ~/.config/pinion/config.toml
    pub fn load() -> Result<Self> {
        let mut config = if let Some(config_path) = Self::find_config_file() {
            tracing::info!(
                path = %config_path.display(),
                "Loading configuration from file"
            );
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            tracing::info!("No config file found, using environment variables and defaults");
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("PINION_BACKEND") {
            self.client.backend = val;
        }
        if let Ok(val) = std::env::var("PINION_AGENT_ID") {
            self.client.agent_id = Some(val);
        }
        if let Ok(val) = std::env::var("PINION_HOST_URL") {
            self.client.host_url = Some(val);
        }
        if let Ok(val) = std::env::var("PINION_CLIENT_ID") {
            self.client.client_id = Some(val);
        }
        if let Ok(val) = std::env::var("PINION_CLIENT_SECRET") {
            self.client.client_secret = Some(val);
            // Clear from environment to prevent exposure via /proc or ps
            std::env::remove_var("PINION_CLIENT_SECRET");
        }
        if let Ok(val) = std::env::var("PINION_VERSION") {
            self.client.version = Some(val);
        }
        if let Ok(val) = std::env::var("PINION_AIA_FILE") {
            self.client.aia_file = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("PINION_WEB_HOST") {
            self.web.host = val;
        }
        if let Ok(val) = std::env::var("PINION_WEB_PORT") {
            self.web.port = val.parse().with_context(|| {
                format!("PINION_WEB_PORT must be a valid port number, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("PINION_LOG_DIR") {
            self.logging.dir = Some(PathBuf::from(val));
        }
        Ok(())
    }

    /// Check values that would otherwise fail later and less clearly
    pub fn validate(&self) -> Result<()> {
        if self.client.backend.trim().is_empty() {
            anyhow::bail!("client.backend must not be empty (set in config.toml or PINION_BACKEND env var)");
        }
        self.poller.validate().context("Invalid [poller] configuration")?;
        if self.web.port == 0 {
            anyhow::bail!("web.port must be greater than 0");
        }
        if self.web.host.trim().is_empty() {
            anyhow::bail!("web.host must not be empty");
        }
        Ok(())
    }

    /// Directory for log files
    pub fn log_dir(&self) -> PathBuf {
        self.logging.dir.clone().unwrap_or_else(paths::log_dir)
    }

    /// Address the HTTP gateway binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.web.host, self.web.port)
    }
}
