use axum::{
    extract::Request,
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use log::info;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;

use crate::api::handlers::handle_chain_api;
use crate::common::Result;
use crate::config::Config;
use crate::node::{ConnectionProvider, NodeConnectionCache, RpcConnectionFactory};

pub const HACHECK_PREFIX: &str = "/hacheck";

// Application State
#[derive(Clone)]
pub struct AppState {
    pub nodes: Arc<dyn ConnectionProvider>,
}

impl AppState {
    pub fn new(nodes: Arc<dyn ConnectionProvider>) -> Self {
        Self { nodes }
    }
}

/// Load-balancer health check: any method on any `/hacheck*` path answers
/// `1` before routing or validation. Callers are not authenticated here.
async fn hacheck_filter(req: Request, next: Next) -> Response {
    if req.uri().path().starts_with(HACHECK_PREFIX) {
        return (StatusCode::OK, "1").into_response();
    }
    next.run(req).await
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

// API Router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/chain/api", post(handle_chain_api))
        .fallback(not_found)
        .layer(middleware::from_fn(hacheck_filter))
        .layer(CompressionLayer::new())
        .with_state(state)
}

/// Run the chain server until Ctrl-C, then close the node connection.
pub async fn run_chain_srv(config: Config) -> Result<()> {
    let factory = Arc::new(RpcConnectionFactory::from_config(&config));
    let cache = Arc::new(NodeConnectionCache::new(factory, config.release_grace()));
    let app = create_router(AppState::new(cache.clone()));

    let listen_addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!("Chain server listening on http://{}", listener.local_addr()?);
    info!("  POST /chain/api   - {}", crate::api::handlers::CLIENT_STATELESS_DEAL);
    info!("  *    {}*    - health check", HACHECK_PREFIX);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Chain server stopped");
    cache.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
    }
}
