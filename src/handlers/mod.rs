pub mod admin;
pub mod bookings;
pub mod health;
pub mod payments;
pub mod resources;
pub mod sweep;

use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/bookings",
            post(bookings::create_booking).get(bookings::list_bookings),
        )
        .route(
            "/bookings/cleanup",
            post(sweep::run_cleanup).get(sweep::preview_cleanup),
        )
        .route(
            "/bookings/:id",
            get(bookings::get_booking)
                .patch(bookings::update_booking)
                .delete(bookings::cancel_booking),
        )
        .route("/bookings/:id/cancel", post(bookings::cancel_booking))
        .route(
            "/resources/:id/availability",
            get(resources::availability),
        )
        .route(
            "/payments/gateway-notify",
            post(payments::gateway_notify),
        )
        .route("/payments/bank-webhook", post(payments::bank_webhook))
        .route("/payments/status", get(payments::payment_status))
        .route("/payments/events", get(payments::list_events))
        .route("/admin/cache/invalidate", post(admin::invalidate_cache))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
                .allow_headers(Any)
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
