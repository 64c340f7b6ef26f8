//! Access to the Lotus full node.
//!
//! [`FullNodeApi`] is the slice of the node API this service calls.
//! [`ConnectionFactory`] builds a client for it and
//! [`cache::NodeConnectionCache`] keeps one alive between requests.

pub mod api_info;
pub mod cache;
pub mod rpc_client;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::common::Result;
use crate::types::{Address, Cid, DataCap, NodeVersion, StartDealParams, TipSetKey};

pub use api_info::{ApiInfo, RpcConnectionFactory};
pub use cache::{ConnectionProvider, NodeConnectionCache};
pub use rpc_client::LotusRpcClient;

#[async_trait]
pub trait FullNodeApi: Send + Sync {
    async fn version(&self) -> Result<NodeVersion>;

    /// Datacap of a verified client, `None` if the address is not one.
    async fn state_verified_client_status(
        &self,
        addr: &Address,
        tsk: &TipSetKey,
    ) -> Result<Option<DataCap>>;

    /// Propose a deal without tracking it in the node; returns the proposal CID.
    async fn client_stateless_deal(&self, params: &StartDealParams) -> Result<Cid>;
}

pub type Closer = Box<dyn FnOnce() + Send>;

/// A node client together with whatever must run when it is dropped from use.
pub struct ConnectionHandle {
    api: Arc<dyn FullNodeApi>,
    closer: Option<Closer>,
}

impl ConnectionHandle {
    pub fn new(api: Arc<dyn FullNodeApi>) -> Self {
        Self { api, closer: None }
    }

    pub fn with_closer(api: Arc<dyn FullNodeApi>, closer: Closer) -> Self {
        Self {
            api,
            closer: Some(closer),
        }
    }

    pub fn api(&self) -> Arc<dyn FullNodeApi> {
        self.api.clone()
    }

    pub fn close(mut self) {
        if let Some(closer) = self.closer.take() {
            closer();
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("has_closer", &self.closer.is_some())
            .finish()
    }
}

/// Produces fresh connections to the node.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self) -> Result<ConnectionHandle>;
}
