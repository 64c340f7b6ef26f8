use async_trait::async_trait;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::rpc_client::LotusRpcClient;
use super::{ConnectionFactory, ConnectionHandle, FullNodeApi};
use crate::common::{Error, Result};
use crate::config::Config;

pub const API_VERSION: &str = "v1";

/// Where and how to reach a node's API: `[token:]address`.
///
/// The address is a multiaddr (`/ip4/127.0.0.1/tcp/1234/http`) or a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiInfo {
    pub token: Option<String>,
    pub addr: String,
}

impl ApiInfo {
    /// Parse the `FULLNODE_API_INFO` format. A token is only split off when
    /// the prefix looks like a JWT, so plain URLs keep their scheme.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Some((token, addr)) = s.split_once(':') {
            if looks_like_jwt(token) && !addr.is_empty() {
                return ApiInfo {
                    token: Some(token.to_string()),
                    addr: addr.to_string(),
                };
            }
        }
        ApiInfo {
            token: None,
            addr: s.to_string(),
        }
    }

    /// Read `<repo>/api` and, when present, `<repo>/token`.
    pub async fn from_repo(repo: &Path) -> Result<Self> {
        let api_path = repo.join("api");
        let addr = tokio::fs::read_to_string(&api_path).await.map_err(|e| {
            Error::Connection(format!(
                "could not read node API address from {}: {} (is the node running?)",
                api_path.display(),
                e
            ))
        })?;

        let token = match tokio::fs::read_to_string(repo.join("token")).await {
            Ok(token) if !token.trim().is_empty() => Some(token.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                debug!("no API token in {}: {}", repo.display(), e);
                None
            }
        };

        Ok(ApiInfo {
            token,
            addr: addr.trim().to_string(),
        })
    }

    /// HTTP endpoint of the JSON-RPC API for the given API version.
    pub fn rpc_url(&self, version: &str) -> Result<String> {
        if self.addr.starts_with('/') {
            let (scheme, host, port) = parse_multiaddr(&self.addr)?;
            return Ok(format!("{}://{}:{}/rpc/{}", scheme, host, port, version));
        }

        let url = if let Some(rest) = self.addr.strip_prefix("ws://") {
            format!("http://{}", rest)
        } else if let Some(rest) = self.addr.strip_prefix("wss://") {
            format!("https://{}", rest)
        } else if self.addr.starts_with("http://") || self.addr.starts_with("https://") {
            self.addr.clone()
        } else {
            return Err(Error::Config(format!("unsupported node address {:?}", self.addr)));
        };
        Ok(format!("{}/rpc/{}", url.trim_end_matches('/'), version))
    }
}

fn looks_like_jwt(s: &str) -> bool {
    s.split('.').count() == 3
        && s.split('.').take(2).all(|part| !part.is_empty())
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.')
}

/// Extract `(scheme, host, port)` from `/ip4|ip6|dns|dns4|dns6/<host>/tcp/<port>[/http|/https|/ws|/wss]`.
fn parse_multiaddr(addr: &str) -> Result<(&'static str, String, u16)> {
    let invalid = |reason: &str| Error::Config(format!("invalid multiaddr {:?}: {}", addr, reason));
    let parts: Vec<&str> = addr.trim_start_matches('/').split('/').collect();

    let host = match parts.as_slice() {
        ["ip4" | "dns" | "dns4" | "dns6", host, ..] => host.to_string(),
        ["ip6", host, ..] => format!("[{}]", host),
        _ => return Err(invalid("expected an ip4, ip6 or dns component")),
    };
    let port = match parts.get(2..4) {
        Some(["tcp", port]) => port.parse::<u16>().map_err(|_| invalid("bad tcp port"))?,
        _ => return Err(invalid("expected a tcp component")),
    };
    let scheme = match parts.get(4) {
        None | Some(&"http") | Some(&"ws") => "http",
        Some(&"https") | Some(&"wss") => "https",
        Some(other) => return Err(invalid(&format!("unsupported protocol {}", other))),
    };
    if parts.len() > 5 {
        return Err(invalid("trailing components"));
    }
    Ok((scheme, host, port))
}

/// Connects to the node described by the process configuration.
///
/// `FULLNODE_API_INFO` wins over the repo directory, as with the Lotus CLI.
pub struct RpcConnectionFactory {
    repo: PathBuf,
    api_info: Option<String>,
    request_timeout: Duration,
}

impl RpcConnectionFactory {
    pub fn new(repo: PathBuf, api_info: Option<String>, request_timeout: Duration) -> Self {
        Self {
            repo,
            api_info,
            request_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.repo_path(),
            config.api_info.clone(),
            config.request_timeout(),
        )
    }

    pub async fn resolve(&self) -> Result<ApiInfo> {
        match self.api_info.as_deref() {
            Some(info) if !info.trim().is_empty() => Ok(ApiInfo::parse(info)),
            _ => ApiInfo::from_repo(&self.repo).await,
        }
    }
}

#[async_trait]
impl ConnectionFactory for RpcConnectionFactory {
    async fn connect(&self) -> Result<ConnectionHandle> {
        let info = self.resolve().await?;
        let url = info.rpc_url(API_VERSION)?;
        let client = LotusRpcClient::new(url.clone(), info.token, self.request_timeout)?;

        let version = client
            .version()
            .await
            .map_err(|e| Error::Connection(format!("full node at {} did not answer: {}", url, e)))?;
        info!("Connected to full node {} at {}", version.version, url);

        let api: Arc<dyn FullNodeApi> = Arc::new(client);
        Ok(ConnectionHandle::with_closer(
            api,
            Box::new(move || debug!("Closed full node connection to {}", url)),
        ))
    }
}
