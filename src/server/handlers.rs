//! Control-surface route handlers

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    pub nonce: String,
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn authorized(state: &AppState, req: &HttpRequest) -> bool {
    bearer_token(req) == Some(state.api_token.as_str())
}

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(json!({"error": "invalid or missing bearer token"}))
}

fn forbidden() -> HttpResponse {
    HttpResponse::Forbidden().json(json!({"error": "invalid or expired nonce"}))
}

/// Liveness probe, unauthenticated.
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Mint a freshness nonce for a subsequent control request.
pub async fn issue_nonce(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    if !authorized(&state, &req) {
        return unauthorized();
    }
    HttpResponse::Ok().json(json!({ "nonce": state.nonces.issue() }))
}

/// Start the job if idle, stop it if running.
pub async fn toggle(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ControlRequest>,
) -> HttpResponse {
    if !authorized(&state, &req) {
        return unauthorized();
    }
    if !state.nonces.consume(&body.nonce) {
        warn!("toggle rejected: bad nonce");
        return forbidden();
    }

    match state.stepper.toggle().await {
        Ok(toggled) => HttpResponse::Ok().json(json!({ "status": toggled.as_str() })),
        Err(e) => {
            error!(error = %e, "toggle failed");
            HttpResponse::InternalServerError().json(json!({"error": e.to_string()}))
        }
    }
}

/// Progress snapshot for the polling client.
pub async fn status(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ControlRequest>,
) -> HttpResponse {
    if !authorized(&state, &req) {
        return unauthorized();
    }
    if !state.nonces.consume(&body.nonce) {
        return forbidden();
    }

    match state.stepper.status().await {
        Ok(status) => HttpResponse::Ok().json(status),
        Err(e) => {
            error!(error = %e, "status query failed");
            HttpResponse::InternalServerError().json(json!({"error": e.to_string()}))
        }
    }
}
