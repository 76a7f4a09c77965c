//! API Middleware
//!
//! Operator-context extraction and request logging. Authentication itself
//! is out of scope: the upstream gateway authenticates and forwards the
//! operator identity in trusted headers; this layer only parses them.

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::domain::types::Role;
use crate::domain::OperationContext;

/// Build the `OperationContext` from the `X-Operator-Id` (required) and
/// `X-Operator-Role` (optional, defaults to OPERATOR) headers.
pub async fn operator_context_middleware(
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let operator_id = match headers.get("X-Operator-Id").and_then(|v| v.to_str().ok()) {
        Some(value) => match Uuid::parse_str(value) {
            Ok(id) => id,
            Err(_) => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "Invalid X-Operator-Id header format",
                        "error_code": "invalid_operator_id"
                    })),
                )
                    .into_response());
            }
        },
        None => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Missing X-Operator-Id header",
                    "error_code": "missing_operator_id"
                })),
            )
                .into_response());
        }
    };

    let role = match headers.get("X-Operator-Role").and_then(|v| v.to_str().ok()) {
        Some(value) => match value.parse::<Role>() {
            Ok(role) => role,
            Err(()) => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "Invalid X-Operator-Role header (expected ADMIN or OPERATOR)",
                        "error_code": "invalid_operator_role"
                    })),
                )
                    .into_response());
            }
        },
        None => Role::Operator,
    };

    let mut context = OperationContext::new(operator_id, role);
    if let Some(ip) = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
    {
        context = context.with_client_ip(ip.trim());
    }
    if let Some(user_agent) = headers.get("User-Agent").and_then(|v| v.to_str().ok()) {
        context = context.with_user_agent(user_agent);
    }

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "request"
    );

    response
}
