pub mod address;
pub mod chain;
pub mod cid;
pub mod deal;
pub mod token;

pub use address::Address;
pub use chain::{ChainEpoch, NodeVersion, TipSetKey};
pub use cid::{Cid, CidEncoder, Multibase};
pub use deal::{DataRef, DealResult, StartDealParams};
pub use token::{DataCap, TokenAmount};
