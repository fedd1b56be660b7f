use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::state::AppState;

fn bearer(headers: &HeaderMap) -> &str {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    auth.strip_prefix("Bearer ").unwrap_or("").trim()
}

fn token_matches(presented: &str, expected: &str) -> bool {
    constant_time_eq::constant_time_eq(presented.as_bytes(), expected.as_bytes())
}

/// Require `Authorization: Bearer <expected_token>`. An empty expected token
/// means the endpoint is switched off.
pub fn check_auth(
    headers: &HeaderMap,
    expected_token: &str,
    what: &'static str,
) -> Result<(), AppError> {
    if expected_token.is_empty() {
        return Err(AppError::NotConfigured(what));
    }
    if !token_matches(bearer(headers), expected_token) {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

/// Whether the request carries the staff token. Never errors; anonymous
/// requests are simply not staff.
pub fn is_staff(headers: &HeaderMap, admin_token: &str) -> bool {
    !admin_token.is_empty() && token_matches(bearer(headers), admin_token)
}

// POST /admin/cache/invalidate
#[derive(Deserialize)]
pub struct InvalidateRequest {
    pub tag: String,
}

#[derive(Serialize)]
pub struct InvalidateResponse {
    tag: String,
    dropped: usize,
}

pub async fn invalidate_cache(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token, "admin token")?;

    let tag = req.tag.trim().to_string();
    if tag.is_empty() {
        return Err(AppError::Validation("tag is required".to_string()));
    }
    let dropped = state.catalog.invalidate(&tag);
    Ok(Json(InvalidateResponse { tag, dropped }))
}
