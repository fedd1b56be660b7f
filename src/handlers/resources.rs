use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::bookings::{self, Availability};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

// GET /resources/:id/availability
pub async fn availability(
    State(state): State<Arc<AppState>>,
    Path(resource_id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Availability>, AppError> {
    let availability =
        bookings::check_availability(&state, &resource_id, query.start_time, query.end_time)?;
    Ok(Json(availability))
}
