pub mod chain;

pub use chain::{handle_chain_api, make_stateless_deal, ChainApiForm, CLIENT_STATELESS_DEAL};
