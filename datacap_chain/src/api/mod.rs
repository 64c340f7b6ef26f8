//! HTTP surface of the chain server

pub mod errors;
pub mod handlers;
pub mod server;

pub use errors::{ApiError, ApiResult};
pub use server::{create_router, run_chain_srv, AppState};
