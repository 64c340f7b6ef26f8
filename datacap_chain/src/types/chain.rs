use serde::{Deserialize, Serialize};

use super::cid::Cid;

pub type ChainEpoch = i64;

/// Identifies the tipset a state query runs against.
/// The empty key asks the node to use its current head.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TipSetKey(Vec<Cid>);

impl TipSetKey {
    pub fn empty() -> Self {
        TipSetKey(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Answer of the node's `Version` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NodeVersion {
    pub version: String,
    #[serde(rename = "APIVersion")]
    pub api_version: u32,
    pub block_delay: u64,
}
