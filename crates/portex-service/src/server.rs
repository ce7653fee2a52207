//! HTTP binding for the expansion service

use crate::rpc::{route_rpc, to_response};
use crate::service::ExpansionService;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use portex_core::{
    Error, ErrorKind, ExpansionResponse, RpcRequest, ServiceConfig, RPC_INVALID_PARAMS,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct AppState {
    pub service: ExpansionService,
    pub started_at: Instant,
}

pub fn router(service: ExpansionService, max_request_bytes: usize) -> Router {
    let state = Arc::new(AppState {
        service,
        started_at: Instant::now(),
    });

    Router::new()
        .route("/health", get(health_handler))
        .route("/expand", post(expand_handler))
        .route("/rpc", post(rpc_handler))
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(state)
}

pub async fn start_server(config: ServiceConfig) -> anyhow::Result<()> {
    let service = ExpansionService::from_config(&config)?;
    let transforms = service.transforms();
    let app = router(service, config.max_request_bytes);

    let bind_addr: SocketAddr = config
        .bind_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address {}: {}", config.bind_addr(), e))?;

    info!("Portex expansion service v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Listening on: {}", bind_addr);
    info!("  Environment:  {}", config.environment);
    for t in &transforms {
        info!("  Transform:    {}", t.urn);
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Runs the CPU-bound expansion off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T, Error>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("expansion task failed: {}", e)))
}

fn status_for(response: &ExpansionResponse) -> StatusCode {
    match &response.error {
        None => StatusCode::OK,
        Some(err) if err.kind == ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        Some(_) => StatusCode::BAD_REQUEST,
    }
}

async fn expand_handler(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let service = state.service.clone();
    let response = run_blocking(move || service.expand_json(&body))
        .await
        .unwrap_or_else(|e| ExpansionResponse::err(&e));
    (status_for(&response), Json(response))
}

async fn rpc_handler(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let req: RpcRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            return Json(to_response(
                "",
                Err((RPC_INVALID_PARAMS, format!("Invalid request: {}", e))),
            ))
        }
    };
    let service = state.service.clone();
    let id = req.id.clone();
    let result = run_blocking(move || route_rpc(&req.method, req.params, &service))
        .await
        .unwrap_or_else(|e| Err((portex_core::RPC_EXPANSION_FAILED, e.to_string())));
    Json(to_response(&id, result))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "transforms": state.service.transforms().len(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}
