//! RPC router: dispatches JSON-RPC style method calls to handlers
//!
//! Methods: `expand`, `transforms.list`, `health`.

use crate::service::ExpansionService;
use portex_core::{
    ExpansionRequest, RpcResponse, RPC_EXPANSION_FAILED, RPC_INVALID_PARAMS, RPC_METHOD_NOT_FOUND,
};
use serde_json::Value;
use tracing::info;

/// Result type for RPC handlers.
pub type RpcResult = Result<Value, (i32, String)>;

/// Route an RPC method call to the appropriate handler.
pub fn route_rpc(method: &str, params: Value, service: &ExpansionService) -> RpcResult {
    match method {
        "expand" => handle_expand(params, service),
        "transforms.list" => handle_transforms_list(service),
        "health" => handle_health(service),
        _ => Err((RPC_METHOD_NOT_FOUND, format!("Method not found: {}", method))),
    }
}

/// Convert an RPC result to an RpcResponse.
pub fn to_response(id: &str, result: RpcResult) -> RpcResponse {
    match result {
        Ok(value) => RpcResponse::ok(id, value),
        Err((code, message)) => RpcResponse::err(id, code, message),
    }
}

// ---------------------------------------------------------------------------
// expand: expand one transform application
// ---------------------------------------------------------------------------

fn handle_expand(params: Value, service: &ExpansionService) -> RpcResult {
    let request: ExpansionRequest = serde_json::from_value(params)
        .map_err(|e| (RPC_INVALID_PARAMS, format!("Invalid params: {}", e)))?;

    info!(
        "expand: namespace={:?} name={}",
        request.namespace, request.transform.unique_name
    );

    let response = service.expand(&request);
    if let Some(err) = &response.error {
        return Err((RPC_EXPANSION_FAILED, format!("{}: {}", err.kind, err.message)));
    }
    serde_json::to_value(&response).map_err(|e| (RPC_EXPANSION_FAILED, format!("Internal: {}", e)))
}

// ---------------------------------------------------------------------------
// transforms.list: registered URNs
// ---------------------------------------------------------------------------

fn handle_transforms_list(service: &ExpansionService) -> RpcResult {
    Ok(serde_json::json!({ "transforms": service.transforms() }))
}

fn handle_health(service: &ExpansionService) -> RpcResult {
    Ok(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "transforms": service.transforms().len(),
        "environment": service.environment_urn(),
    }))
}
