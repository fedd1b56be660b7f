use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::admin::check_auth;
use crate::models::{BookingStatus, PaymentEventRecord, PaymentSource, PaymentStatus};
use crate::services::bookings;
use crate::services::reconciler::{
    self, BankWebhookPayload, GatewayNotification, ReconcileOutcome,
};
use crate::state::AppState;

// POST /payments/gateway-notify
#[derive(Serialize)]
pub struct GatewayAck {
    received: bool,
    outcome: &'static str,
}

pub async fn gateway_notify(
    State(state): State<Arc<AppState>>,
    Json(notification): Json<GatewayNotification>,
) -> Result<Json<GatewayAck>, AppError> {
    let config = &state.config;
    if config.gateway_secret_key.is_empty() {
        return Err(AppError::NotConfigured("payment gateway"));
    }

    let partner_ok = notification.partner_code == config.gateway_partner_code;
    if !partner_ok
        || !reconciler::verify_gateway_signature(
            &config.gateway_secret_key,
            &config.gateway_access_key,
            &notification,
        )
    {
        tracing::warn!(order_id = %notification.order_id, "gateway notification failed authentication");
        return Err(AppError::Unauthorized);
    }

    let now = Utc::now();
    let Some(event) = notification.to_event() else {
        tracing::info!(
            order_id = %notification.order_id,
            result_code = notification.result_code,
            message = %notification.message,
            "gateway reported a non-success result, ignoring"
        );
        let transaction_id = notification.trans_id.to_string();
        reconciler::record_skipped(
            &state,
            PaymentSource::Gateway,
            Some(&notification.order_id),
            Some(notification.amount),
            Some(&transaction_id),
            "ignored_result_code",
            now,
        )?;
        return Ok(Json(GatewayAck {
            received: true,
            outcome: "ignored_result_code",
        }));
    };

    let outcome = reconciler::reconcile(&state, &event, now).await?;
    Ok(Json(GatewayAck {
        received: true,
        outcome: outcome.as_str(),
    }))
}

// POST /payments/bank-webhook
#[derive(Serialize, Default)]
pub struct BankWebhookAck {
    success: bool,
    applied: usize,
    already_paid: usize,
    skipped: usize,
}

pub async fn bank_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<BankWebhookPayload>,
) -> Result<Json<BankWebhookAck>, AppError> {
    check_auth(&headers, &state.config.bank_webhook_token, "bank webhook token")?;

    let now = Utc::now();
    let mut ack = BankWebhookAck {
        success: true,
        ..Default::default()
    };

    for tx in &payload.transactions {
        let event = match tx.to_event() {
            Ok(event) => event,
            Err(skip) => {
                tracing::warn!(
                    channel = PaymentSource::BankTransfer.as_str(),
                    transaction_id = %tx.transaction_id(),
                    amount = tx.transfer_amount,
                    reason = skip.as_str(),
                    "bank transaction skipped"
                );
                let transaction_id = tx.transaction_id();
                reconciler::record_skipped(
                    &state,
                    PaymentSource::BankTransfer,
                    None,
                    Some(tx.transfer_amount),
                    Some(&transaction_id),
                    skip.as_str(),
                    now,
                )?;
                ack.skipped += 1;
                continue;
            }
        };

        match reconciler::reconcile(&state, &event, now).await? {
            ReconcileOutcome::Applied { .. } => ack.applied += 1,
            ReconcileOutcome::AlreadyPaid { .. } => ack.already_paid += 1,
            _ => ack.skipped += 1,
        }
    }

    tracing::info!(
        received = payload.transactions.len(),
        applied = ack.applied,
        already_paid = ack.already_paid,
        skipped = ack.skipped,
        "bank webhook processed"
    );
    Ok(Json(ack))
}

// GET /payments/status?bookingId=
#[derive(Deserialize)]
pub struct PaymentStatusQuery {
    #[serde(rename = "bookingId", alias = "booking_id")]
    pub booking_id: String,
}

#[derive(Serialize)]
pub struct PaymentStatusResponse {
    booking_id: String,
    booking_code: String,
    status: BookingStatus,
    payment_status: PaymentStatus,
    total: i64,
    paid_at: Option<DateTime<Utc>>,
}

pub async fn payment_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaymentStatusQuery>,
) -> Result<Json<PaymentStatusResponse>, AppError> {
    let booking = bookings::get_booking(&state, &query.booking_id)?;
    Ok(Json(PaymentStatusResponse {
        booking_id: booking.id,
        booking_code: booking.booking_code,
        status: booking.status,
        payment_status: booking.payment_status,
        total: booking.pricing.total,
        paid_at: booking.paid_at,
    }))
}

// GET /payments/events
#[derive(Deserialize)]
pub struct EventsQuery {
    pub outcome: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<PaymentEventRecord>>, AppError> {
    check_auth(&headers, &state.config.admin_token, "admin token")?;

    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let events = {
        let db = state.db()?;
        queries::list_payment_events(&db, query.outcome.as_deref(), limit)?
    };
    Ok(Json(events))
}
