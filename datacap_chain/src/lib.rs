//! Bridge that accepts stateless storage deal requests over HTTP and
//! submits them to a Lotus full node, deciding the verified flag from the
//! wallet's live datacap status.

pub mod api;
pub mod common;
pub mod config;
pub mod node;
pub mod types;

pub use common::{Error, Result};
pub use config::Config;
