use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::address::Address;
use super::chain::ChainEpoch;
use super::cid::Cid;
use super::token::TokenAmount;

/// Data is handed to the provider out of band.
pub const TRANSFER_TYPE_MANUAL: &str = "manual";

const DATA_REF_FIELDS: &[&str] = &["TransferType", "Root", "PieceCid", "PieceSize", "RawBlockSize"];
const START_DEAL_FIELDS: &[&str] = &[
    "Data",
    "Wallet",
    "Miner",
    "EpochPrice",
    "MinBlocksDuration",
    "ProviderCollateral",
    "DealStartEpoch",
    "FastRetrieval",
    "VerifiedDeal",
];

/// Reference to the payload a deal is made for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DataRef {
    pub transfer_type: String,
    pub root: Option<Cid>,
    pub piece_cid: Option<Cid>,
    pub piece_size: u64,
    pub raw_block_size: u64,
}

/// Parameters of a stateless deal, in the node's `StartDealParams` shape.
///
/// Missing fields decode to their defaults and unknown fields are ignored.
/// `verified_deal` is accepted on input but always recomputed before the
/// proposal is sent to the node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StartDealParams {
    pub data: Option<DataRef>,
    pub wallet: Address,
    pub miner: Address,
    pub epoch_price: TokenAmount,
    pub min_blocks_duration: u64,
    pub provider_collateral: TokenAmount,
    pub deal_start_epoch: ChainEpoch,
    pub fast_retrieval: bool,
    pub verified_deal: bool,
}

impl StartDealParams {
    /// Decode caller supplied JSON the way the node does: object keys match
    /// field names case-insensitively, an exact match taking precedence.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let value = match serde_json::from_str(text)? {
            Value::Object(map) => {
                let mut map = fold_keys(map, START_DEAL_FIELDS);
                if let Some(Value::Object(data)) = map.get_mut("Data") {
                    *data = fold_keys(std::mem::take(data), DATA_REF_FIELDS);
                }
                Value::Object(map)
            }
            other => other,
        };
        serde_json::from_value(value)
    }
}

/// Rename keys to the field they case-insensitively match, dropping unknown
/// ones.
fn fold_keys(map: Map<String, Value>, fields: &[&str]) -> Map<String, Value> {
    let mut out = Map::new();
    let mut folded = Vec::new();
    for (key, value) in map {
        match fields.iter().find(|field| field.eq_ignore_ascii_case(&key)) {
            Some(field) if *field == key => {
                out.insert(key, value);
            }
            Some(field) => folded.push((field.to_string(), value)),
            None => {}
        }
    }
    for (field, value) in folded {
        out.entry(field).or_insert(value);
    }
    out
}

/// JSON body returned to HTTP callers on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DealResult {
    pub prop_cid: String,
    pub verified: bool,
}
