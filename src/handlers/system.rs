use axum::response::Json;
use serde_json::{json, Value};

/// GET / - service description
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "name": "policy-gateway",
        "version": version,
        "description": "Per-request SSH tunnel gateway for policy records",
        "endpoints": {
            "list": "GET /p_policies",
            "get": "GET /gp_policies/:policy_id",
            "update": "PUT /up_policies/:policy_id",
            "health": "GET /health"
        },
        "headers": ["X-Cert-Location", "X-SSH-User", "X-SSH-Password"]
    }))
}

/// GET /health - process liveness only; opening a tunnel needs caller credentials
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now()
    }))
}
