use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::admin::{check_auth, is_staff};
use crate::models::{Booking, BookingStatus};
use crate::services::bookings::{self, CreateBookingRequest, CreatedBooking, UpdateBookingRequest};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

// POST /bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<CreatedBooking>), AppError> {
    let staff = is_staff(&headers, &state.config.admin_token);
    let created = bookings::create_booking(&state, req, staff, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

// GET /bookings
#[derive(Deserialize)]
pub struct ListBookingsQuery {
    pub status: Option<String>,
    pub date: Option<NaiveDate>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_auth(&headers, &state.config.admin_token, "admin token")?;

    let status = match query.status.as_deref() {
        Some(s) => Some(
            BookingStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown status: {s}")))?,
        ),
        None => None,
    };
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let bookings = {
        let db = state.db()?;
        queries::list_bookings(&db, status, query.date, limit)?
    };
    Ok(Json(bookings))
}

// GET /bookings/:id  (id or booking code)
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(bookings::get_booking(&state, &id)?))
}

// PATCH /bookings/:id
pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token, "admin token")?;
    let booking = bookings::update_booking(&state, &id, req, Utc::now()).await?;
    Ok(Json(booking))
}

// POST /bookings/:id/cancel, DELETE /bookings/:id
#[derive(Deserialize, Default)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<Booking>, AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let booking = bookings::cancel_booking(&state, &id, req.reason, Utc::now())?;
    Ok(Json(booking))
}
