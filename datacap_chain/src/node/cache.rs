//! Single-slot cache of the node connection.
//!
//! Every operation holds the slot lock for its whole body, so no two callers
//! can race to build two live connections. [`NodeConnectionCache::release`]
//! also waits out its grace interval while holding the lock, which throttles
//! reconnect attempts right after a failure: everyone else waits with it.

use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{ConnectionFactory, ConnectionHandle, FullNodeApi};
use crate::common::Result;

pub const DEFAULT_RELEASE_GRACE: Duration = Duration::from_secs(3);

/// Hands out a usable node client and takes back reports of trouble.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Return the cached client, connecting first if there is none.
    async fn acquire(&self) -> Result<Arc<dyn FullNodeApi>>;

    /// Close the cached client on `shutdown`, otherwise keep it only if it
    /// still answers a liveness probe.
    async fn release(&self, shutdown: bool);

    /// Report a failed call made with the current client.
    async fn invalidate(&self) {
        self.release(false).await
    }
}

pub struct NodeConnectionCache {
    factory: Arc<dyn ConnectionFactory>,
    grace: Duration,
    slot: Mutex<Option<ConnectionHandle>>,
}

impl NodeConnectionCache {
    pub fn new(factory: Arc<dyn ConnectionFactory>, grace: Duration) -> Self {
        Self {
            factory,
            grace,
            slot: Mutex::new(None),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    pub async fn shutdown(&self) {
        self.release(true).await
    }
}

#[async_trait]
impl ConnectionProvider for NodeConnectionCache {
    async fn acquire(&self) -> Result<Arc<dyn FullNodeApi>> {
        let mut slot = self.slot.lock().await;
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.api());
        }

        match self.factory.connect().await {
            Ok(handle) => {
                let api = handle.api();
                *slot = Some(handle);
                Ok(api)
            }
            Err(e) => {
                if let Some(stale) = slot.take() {
                    stale.close();
                }
                Err(e)
            }
        }
    }

    async fn release(&self, shutdown: bool) {
        let mut slot = self.slot.lock().await;
        tokio::time::sleep(self.grace).await;

        let Some(api) = slot.as_ref().map(ConnectionHandle::api) else {
            return;
        };

        if shutdown {
            if let Some(handle) = slot.take() {
                handle.close();
            }
            info!("Full node connection closed");
            return;
        }

        match api.version().await {
            Ok(version) => debug!("Full node {} still reachable, keeping connection", version.version),
            Err(e) => {
                warn!("Full node liveness probe failed, dropping connection: {}", e);
                if let Some(handle) = slot.take() {
                    handle.close();
                }
            }
        }
    }
}
