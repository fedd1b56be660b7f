//! Payment reconciliation.
//!
//! Both inbound channels (gateway notifications and the bank statement
//! webhook) are normalized into a [`PaymentEvent`] and go through
//! [`reconcile`]. The paid transition is a guarded write keyed on the
//! payment status that was read, so two deliveries racing for the same
//! booking can only flip it once, and the confirmation is only sent by the
//! delivery whose write landed.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rusqlite::Connection;
use serde::Deserialize;
use sha2::Sha256;

use crate::db::queries::{self, NewPaymentEvent};
use crate::errors::AppError;
use crate::models::{Booking, BookingRef, BookingStatus, PaymentEvent, PaymentSource, PaymentStatus};
use crate::services::booking_code;
use crate::services::lifecycle::{self, PaidTransition};
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// `resultCode` the gateway sends for a completed payment.
pub const GATEWAY_SUCCESS_CODE: i64 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied {
        booking_id: String,
    },
    AlreadyPaid {
        booking_id: String,
    },
    BookingNotFound,
    AmountMismatch {
        booking_id: String,
        expected: i64,
        received: i64,
    },
    NotPayable {
        booking_id: String,
        status: BookingStatus,
        payment_status: PaymentStatus,
    },
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Applied { .. } => "applied",
            ReconcileOutcome::AlreadyPaid { .. } => "already_paid",
            ReconcileOutcome::BookingNotFound => "booking_not_found",
            ReconcileOutcome::AmountMismatch { .. } => "amount_mismatch",
            ReconcileOutcome::NotPayable { .. } => "booking_not_payable",
        }
    }

    pub fn booking_id(&self) -> Option<&str> {
        match self {
            ReconcileOutcome::Applied { booking_id }
            | ReconcileOutcome::AlreadyPaid { booking_id }
            | ReconcileOutcome::AmountMismatch { booking_id, .. }
            | ReconcileOutcome::NotPayable { booking_id, .. } => Some(booking_id),
            ReconcileOutcome::BookingNotFound => None,
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            ReconcileOutcome::AmountMismatch {
                expected, received, ..
            } => Some(format!("expected {expected}, received {received}")),
            ReconcileOutcome::NotPayable {
                status,
                payment_status,
                ..
            } => Some(format!(
                "booking is {} / {}",
                status.as_str(),
                payment_status.as_str()
            )),
            _ => None,
        }
    }
}

/// Apply one payment event against the store.
///
/// Returns the outcome, plus the updated booking when this call is the one
/// that moved it to paid.
pub fn apply_payment(
    conn: &Connection,
    event: &PaymentEvent,
    now: DateTime<Utc>,
) -> anyhow::Result<(ReconcileOutcome, Option<Booking>)> {
    let Some(booking) = lookup(conn, &event.booking_ref)? else {
        return Ok((ReconcileOutcome::BookingNotFound, None));
    };
    apply_to_loaded(conn, booking, event, now)
}

/// Second half of [`apply_payment`]. `booking` may already be stale; the
/// guarded write re-checks it against the stored row.
fn apply_to_loaded(
    conn: &Connection,
    mut booking: Booking,
    event: &PaymentEvent,
    now: DateTime<Utc>,
) -> anyhow::Result<(ReconcileOutcome, Option<Booking>)> {
    if booking.payment_status == PaymentStatus::Paid {
        return Ok((
            ReconcileOutcome::AlreadyPaid {
                booking_id: booking.id,
            },
            None,
        ));
    }

    if event.amount != booking.pricing.total {
        return Ok((
            ReconcileOutcome::AmountMismatch {
                booking_id: booking.id,
                expected: booking.pricing.total,
                received: event.amount,
            },
            None,
        ));
    }

    let expected_status = booking.status;
    let expected_payment = booking.payment_status;
    match lifecycle::mark_paid(&mut booking, event.source.as_str(), &event.transaction_id, now) {
        Ok(PaidTransition::Applied) => {}
        Ok(PaidTransition::AlreadyPaid) => {
            return Ok((
                ReconcileOutcome::AlreadyPaid {
                    booking_id: booking.id,
                },
                None,
            ))
        }
        Err(_) => {
            return Ok((
                ReconcileOutcome::NotPayable {
                    booking_id: booking.id,
                    status: expected_status,
                    payment_status: expected_payment,
                },
                None,
            ))
        }
    }

    if queries::update_booking_guarded(conn, &booking, expected_status, expected_payment)? {
        let outcome = ReconcileOutcome::Applied {
            booking_id: booking.id.clone(),
        };
        return Ok((outcome, Some(booking)));
    }

    // Someone else wrote first. Decide from what is stored now.
    let outcome = match queries::get_booking_by_id(conn, &booking.id)? {
        Some(current) if current.payment_status == PaymentStatus::Paid => {
            ReconcileOutcome::AlreadyPaid {
                booking_id: current.id,
            }
        }
        Some(current) => ReconcileOutcome::NotPayable {
            booking_id: current.id,
            status: current.status,
            payment_status: current.payment_status,
        },
        None => ReconcileOutcome::BookingNotFound,
    };
    Ok((outcome, None))
}

fn lookup(conn: &Connection, booking_ref: &BookingRef) -> anyhow::Result<Option<Booking>> {
    match booking_ref {
        BookingRef::Id(id) => queries::get_booking_by_id(conn, id),
        BookingRef::Code(code) => queries::get_booking_by_code(conn, code),
    }
}

/// Single entry point for every payment channel: apply the event, append
/// it to the ledger, and send the confirmation if this call confirmed the
/// booking.
pub async fn reconcile(
    state: &AppState,
    event: &PaymentEvent,
    now: DateTime<Utc>,
) -> Result<ReconcileOutcome, AppError> {
    let (outcome, confirmed) = {
        let db = state.db()?;
        let (outcome, confirmed) = apply_payment(&db, event, now)?;
        let detail = outcome.detail();
        queries::insert_payment_event(
            &db,
            &NewPaymentEvent {
                channel: event.source.as_str(),
                booking_ref: Some(event.booking_ref.as_str()),
                booking_id: outcome.booking_id(),
                amount: Some(event.amount),
                transaction_id: Some(&event.transaction_id),
                outcome: outcome.as_str(),
                detail: detail.as_deref(),
                received_at: now,
            },
        )?;
        (outcome, confirmed)
    };

    match &outcome {
        ReconcileOutcome::Applied { booking_id } => tracing::info!(
            channel = event.source.as_str(),
            booking_id = %booking_id,
            transaction_id = %event.transaction_id,
            amount = event.amount,
            "payment applied"
        ),
        ReconcileOutcome::AlreadyPaid { booking_id } => tracing::info!(
            channel = event.source.as_str(),
            booking_id = %booking_id,
            transaction_id = %event.transaction_id,
            "payment already recorded, ignoring replay"
        ),
        other => tracing::warn!(
            channel = event.source.as_str(),
            booking_ref = %event.booking_ref.as_str(),
            transaction_id = %event.transaction_id,
            amount = event.amount,
            outcome = other.as_str(),
            reason = %other.detail().unwrap_or_default(),
            "payment not applied, needs manual review"
        ),
    }

    if let Some(booking) = confirmed {
        if let Err(e) = state.notifier.booking_confirmed(&booking).await {
            tracing::warn!(booking_code = %booking.booking_code, error = %e, "confirmation notification failed");
        }
    }

    Ok(outcome)
}

/// Ledger entry for an authenticated event that never reached
/// [`reconcile`] (non-success result code, memo without a booking code).
pub fn record_skipped(
    state: &AppState,
    channel: PaymentSource,
    booking_ref: Option<&str>,
    amount: Option<i64>,
    transaction_id: Option<&str>,
    outcome: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let db = state.db()?;
    queries::insert_payment_event(
        &db,
        &NewPaymentEvent {
            channel: channel.as_str(),
            booking_ref,
            booking_id: None,
            amount,
            transaction_id,
            outcome,
            detail: None,
            received_at: now,
        },
    )?;
    Ok(())
}

// ── Gateway notifications ──

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayNotification {
    pub partner_code: String,
    pub order_id: String,
    pub request_id: String,
    pub amount: i64,
    #[serde(default)]
    pub order_info: String,
    #[serde(default)]
    pub order_type: String,
    pub trans_id: i64,
    pub result_code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub pay_type: String,
    pub response_time: i64,
    #[serde(default)]
    pub extra_data: String,
    #[serde(rename = "m2signature", alias = "signature")]
    pub signature: String,
}

impl GatewayNotification {
    pub fn is_success(&self) -> bool {
        self.result_code == GATEWAY_SUCCESS_CODE
    }

    /// The event to reconcile, or `None` for a non-success result code.
    pub fn to_event(&self) -> Option<PaymentEvent> {
        self.is_success().then(|| PaymentEvent {
            source: PaymentSource::Gateway,
            booking_ref: BookingRef::Id(self.order_id.clone()),
            amount: self.amount,
            transaction_id: self.trans_id.to_string(),
        })
    }
}

/// The string the gateway signs: fixed key order, `&`-joined, raw values.
pub fn canonical_string(access_key: &str, n: &GatewayNotification) -> String {
    format!(
        "accessKey={}&amount={}&extraData={}&message={}&orderId={}&orderInfo={}&orderType={}&partnerCode={}&payType={}&requestId={}&responseTime={}&resultCode={}&transId={}",
        access_key,
        n.amount,
        n.extra_data,
        n.message,
        n.order_id,
        n.order_info,
        n.order_type,
        n.partner_code,
        n.pay_type,
        n.request_id,
        n.response_time,
        n.result_code,
        n.trans_id,
    )
}

/// Lowercase hex HMAC-SHA256 of the canonical string.
pub fn sign_gateway_notification(secret: &str, access_key: &str, n: &GatewayNotification) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(canonical_string(access_key, n).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub fn verify_gateway_signature(secret: &str, access_key: &str, n: &GatewayNotification) -> bool {
    let Ok(provided) = hex::decode(n.signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(canonical_string(access_key, n).as_bytes());
    mac.verify_slice(&provided).is_ok()
}

// ── Bank statement webhook ──

#[derive(Debug, Clone, Deserialize)]
pub struct BankWebhookPayload {
    #[serde(default)]
    pub transactions: Vec<BankTransaction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTransaction {
    pub id: Option<i64>,
    #[serde(alias = "description")]
    pub content: String,
    pub transfer_amount: i64,
    pub transfer_type: String,
    pub reference_code: Option<String>,
    pub transaction_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankSkip {
    Outgoing,
    NoBookingCode,
}

impl BankSkip {
    pub fn as_str(&self) -> &'static str {
        match self {
            BankSkip::Outgoing => "outgoing_transfer",
            BankSkip::NoBookingCode => "no_booking_code",
        }
    }
}

impl BankTransaction {
    pub fn transaction_id(&self) -> String {
        match (&self.reference_code, self.id) {
            (Some(reference), _) if !reference.trim().is_empty() => reference.trim().to_string(),
            (_, Some(id)) => id.to_string(),
            _ => format!("memo:{}", self.content.trim()),
        }
    }

    pub fn to_event(&self) -> Result<PaymentEvent, BankSkip> {
        if !self.transfer_type.eq_ignore_ascii_case("in") {
            return Err(BankSkip::Outgoing);
        }
        let code = booking_code::extract_from_memo(&self.content).ok_or(BankSkip::NoBookingCode)?;
        Ok(PaymentEvent {
            source: PaymentSource::BankTransfer,
            booking_ref: BookingRef::Code(code),
            amount: self.transfer_amount,
            transaction_id: self.transaction_id(),
        })
    }
}
