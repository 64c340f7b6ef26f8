use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::FullNodeApi;
use crate::common::{Error, RemoteErrorKind, Result};
use crate::types::{Address, Cid, DataCap, NodeVersion, StartDealParams, TipSetKey};

pub const METHOD_VERSION: &str = "Filecoin.Version";
pub const METHOD_VERIFIED_CLIENT_STATUS: &str = "Filecoin.StateVerifiedClientStatus";
pub const METHOD_CLIENT_STATELESS_DEAL: &str = "Filecoin.ClientStatelessDeal";

const NO_PARAMS: [u8; 0] = [];

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    #[serde(default)]
    message: String,
}

/// JSON-RPC 2.0 client for the Lotus v1 full node API over HTTP.
pub struct LotusRpcClient {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
    next_id: AtomicU64,
}

impl LotusRpcClient {
    pub fn new(url: String, token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Connection(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            url,
            token,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<P, R>(&self, method: &'static str, params: P) -> Result<R>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("rpc call #{} {} -> {}", id, method, self.url);

        let mut request = self.http.post(&self.url).json(&JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::remote(method, RemoteErrorKind::Transport(e.to_string())))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::remote(method, RemoteErrorKind::Status(status.as_u16())));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| Error::remote(method, RemoteErrorKind::Decode(e.to_string())))?;
        if let Some(err) = body.error {
            return Err(Error::remote(
                method,
                RemoteErrorKind::Rpc {
                    code: err.code,
                    message: err.message,
                },
            ));
        }

        serde_json::from_value(body.result.unwrap_or(serde_json::Value::Null))
            .map_err(|e| Error::remote(method, RemoteErrorKind::Decode(e.to_string())))
    }
}

#[async_trait]
impl FullNodeApi for LotusRpcClient {
    async fn version(&self) -> Result<NodeVersion> {
        self.call(METHOD_VERSION, NO_PARAMS).await
    }

    async fn state_verified_client_status(
        &self,
        addr: &Address,
        tsk: &TipSetKey,
    ) -> Result<Option<DataCap>> {
        self.call(METHOD_VERIFIED_CLIENT_STATUS, (addr, tsk)).await
    }

    async fn client_stateless_deal(&self, params: &StartDealParams) -> Result<Cid> {
        self.call(METHOD_CLIENT_STATELESS_DEAL, (params,)).await
    }
}
