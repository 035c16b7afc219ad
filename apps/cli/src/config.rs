//! Client configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/photochain/client.toml`
//! - Windows: `%APPDATA%/photochain/client.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use photochain_upload::{MAX_FILE_SIZE, NodeSpec};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "client.toml";
const SESSION_FILE: &str = "session.json";

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the user and blockchain services.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Session file; empty means `session.json` next to the config file.
    #[serde(default)]
    pub session_path: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Largest file accepted for upload, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Interval of `chain --watch`.
    #[serde(default = "default_chain_refresh_secs")]
    pub chain_refresh_secs: u64,

    /// Nodes available for failure simulation.
    #[serde(default = "NodeSpec::local_defaults")]
    pub nodes: Vec<NodeSpec>,
}

fn default_api_url() -> String {
    "http://localhost:5001".into()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_upload_bytes() -> u64 {
    MAX_FILE_SIZE
}

fn default_chain_refresh_secs() -> u64 {
    10
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            session_path: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            max_upload_bytes: default_max_upload_bytes(),
            chain_refresh_secs: default_chain_refresh_secs(),
            nodes: NodeSpec::local_defaults(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from `path` (or the default location), creating
    /// a default file if none exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: ClientConfig = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            Ok(config)
        } else {
            let config = ClientConfig::default();
            config.save(&path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Replaces `api_url` when an override is given.
    pub fn with_api_url(mut self, api_url: Option<String>) -> Self {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_url = url;
        }
        self
    }

    /// Resolved session file path.
    pub fn session_file(&self) -> anyhow::Result<PathBuf> {
        if self.session_path.is_empty() {
            Ok(config_dir()?.join(SESSION_FILE))
        } else {
            Ok(PathBuf::from(&self.session_path))
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn chain_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.chain_refresh_secs.max(1))
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

fn config_dir() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home).join(".config").join("photochain"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("photochain"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/photochain"))
    }
}
