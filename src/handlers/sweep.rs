use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::errors::AppError;
use crate::handlers::admin::check_auth;
use crate::services::sweeper::SweepParams;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct CleanupQuery {
    pub limit: Option<i64>,
}

// POST /bookings/cleanup
pub async fn run_cleanup(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<CleanupQuery>,
) -> Result<Response, AppError> {
    check_auth(&headers, &state.config.sweep_secret, "sweep secret")?;
    sweep(&state, false, query.limit).await
}

// GET /bookings/cleanup
pub async fn preview_cleanup(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<CleanupQuery>,
) -> Result<Response, AppError> {
    check_auth(&headers, &state.config.sweep_secret, "sweep secret")?;
    sweep(&state, true, query.limit).await
}

async fn sweep(state: &AppState, dry_run: bool, limit: Option<i64>) -> Result<Response, AppError> {
    let sweeper = Arc::clone(&state.sweeper);
    let params = SweepParams {
        now: Utc::now(),
        dry_run,
        limit,
    };
    let report = tokio::task::spawn_blocking(move || sweeper.run(params))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("sweep task failed: {e}")))??;

    match report {
        Some(report) => Ok(Json(report).into_response()),
        None => Ok((
            StatusCode::CONFLICT,
            Json(serde_json::json!({"error": "a sweep is already running"})),
        )
            .into_response()),
    }
}
