use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::{Error, Result};

/// Service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server binds to; `:9081` means all interfaces
    pub listen: String,
    /// Lotus repo directory holding the node's `api` and `token` files
    pub repo: String,
    /// `token:multiaddr` of the node, takes precedence over `repo`
    pub api_info: Option<String>,
    /// Wait before a release acts, in milliseconds
    pub release_grace_ms: u64,
    /// Timeout of a single node API call, in seconds
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: ":9081".to_string(),
            repo: "~/.lotus".to_string(),
            api_info: None,
            release_grace_ms: 3000,
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load a YAML config file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Config = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen.trim().is_empty() {
            return Err(Error::Config("listen address is empty".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Bindable form of `listen`: a bare `:port` binds every interface.
    pub fn listen_addr(&self) -> String {
        match self.listen.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{}", port),
            None => self.listen.clone(),
        }
    }

    pub fn repo_path(&self) -> PathBuf {
        expand_home(&self.repo)
    }

    pub fn release_grace(&self) -> Duration {
        Duration::from_millis(self.release_grace_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Expand a leading `~` to `$HOME`.
pub fn expand_home(path: &str) -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    match (path, home) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}
