use chrono::{DateTime, Duration, FixedOffset, SubsecRound, Utc};
use rusqlite::TransactionBehavior;
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, InsertOutcome, NewPaymentEvent};
use crate::errors::AppError;
use crate::models::{AddOnLine, Booking, BookingStatus, CustomerSnapshot, PaymentSource, PaymentStatus};
use crate::services::business_offset;
use crate::services::catalog::Catalog;
use crate::services::payment_qr::TransferQrRequest;
use crate::services::pricing::{self, ComboRate, LineItemPrice, PriceInput};
use crate::services::{booking_code, lifecycle};
use crate::state::AppState;

const MIN_DURATION_MINUTES: i64 = 60;
const MAX_CODE_ATTEMPTS: usize = 5;
const MAX_ADD_ON_QUANTITY: i64 = 99;
const MAX_NAME_CHARS: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub resource_id: String,
    pub start_time: DateTime<Utc>,
    /// Ignored when a combo is selected; the combo fixes the duration.
    pub end_time: Option<DateTime<Utc>>,
    pub customer: CustomerInput,
    pub combo_id: Option<String>,
    #[serde(default)]
    pub add_ons: Vec<AddOnRequest>,
    #[serde(default)]
    pub discount: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerInput {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub national_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddOnRequest {
    pub item_id: String,
    pub quantity: i64,
}

/// What the payment screen shows after a booking is created.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentInstructions {
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
    pub amount: i64,
    pub memo: String,
    pub qr_data_url: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedBooking {
    pub booking: Booking,
    pub payment: PaymentInstructions,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Interval {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub resource_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub available: bool,
    pub conflict: Option<Interval>,
}

// ── Validation ──

pub fn validate_customer(input: &CustomerInput) -> Result<CustomerSnapshot, AppError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("customer name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "customer name must be at most {MAX_NAME_CHARS} characters"
        )));
    }

    let phone = input.phone.trim();
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if !(9..=15).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::Validation(
            "phone must be 9 to 15 digits, optionally starting with +".to_string(),
        ));
    }

    let email = match input.email.as_deref().map(str::trim) {
        Some("") | None => None,
        Some(e) if e.contains('@') => Some(e.to_string()),
        Some(_) => return Err(AppError::Validation("email is not valid".to_string())),
    };

    let national_id = input.national_id.trim();
    if !matches!(national_id.len(), 9 | 12) || !national_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::Validation(
            "national id must be exactly 9 or 12 digits".to_string(),
        ));
    }

    Ok(CustomerSnapshot {
        name: name.to_string(),
        phone: phone.to_string(),
        email,
        national_id: national_id.to_string(),
    })
}

pub fn validate_interval(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
    lead: Duration,
) -> Result<(), AppError> {
    if end <= start {
        return Err(AppError::Validation(
            "end_time must be after start_time".to_string(),
        ));
    }
    if end - start < Duration::minutes(MIN_DURATION_MINUTES) {
        return Err(AppError::Validation(
            "a booking must last at least 1 hour".to_string(),
        ));
    }
    if start < now + lead {
        return Err(AppError::Validation(format!(
            "start_time must be at least {} minutes from now",
            lead.num_minutes()
        )));
    }
    Ok(())
}

fn resolve_add_ons(
    catalog: &Catalog,
    conn: &rusqlite::Connection,
    requested: &[AddOnRequest],
) -> Result<Vec<AddOnLine>, AppError> {
    let mut lines = Vec::with_capacity(requested.len());
    for add_on in requested {
        if !(1..=MAX_ADD_ON_QUANTITY).contains(&add_on.quantity) {
            return Err(AppError::Validation(format!(
                "quantity for {} must be between 1 and {MAX_ADD_ON_QUANTITY}",
                add_on.item_id
            )));
        }
        let item = catalog
            .menu_item(conn, &add_on.item_id)?
            .filter(|i| i.is_active)
            .ok_or_else(|| {
                AppError::Validation(format!("menu item {} is not available", add_on.item_id))
            })?;
        lines.push(AddOnLine {
            item_id: item.id,
            name: item.name,
            unit_price: item.price,
            quantity: add_on.quantity,
        });
    }
    Ok(lines)
}

// ── Create ──

pub async fn create_booking(
    state: &AppState,
    req: CreateBookingRequest,
    staff: bool,
    now: DateTime<Utc>,
) -> Result<CreatedBooking, AppError> {
    if req.discount < 0 {
        return Err(AppError::Validation("discount cannot be negative".to_string()));
    }
    if req.discount > 0 && !staff {
        return Err(AppError::Forbidden(
            "only staff can apply a discount".to_string(),
        ));
    }
    let customer = validate_customer(&req.customer)?;

    let now = now.trunc_subsecs(0);
    let start = req.start_time.trunc_subsecs(0);
    let lead = Duration::minutes(state.config.booking_lead_minutes);
    let offset = business_offset(state.config.business_utc_offset_minutes);

    let mut booking = {
        let db = state.db()?;
        let resource = state
            .catalog
            .resource(&db, &req.resource_id)?
            .filter(|r| r.is_active)
            .ok_or_else(|| AppError::NotFound(format!("resource {}", req.resource_id)))?;

        let combo = match &req.combo_id {
            Some(id) => Some(
                state
                    .catalog
                    .combo(&db, id)?
                    .filter(|c| c.is_active)
                    .ok_or_else(|| AppError::Validation(format!("combo {id} is not available")))?,
            ),
            None => None,
        };

        let end = match &combo {
            Some(c) => start + Duration::minutes(c.duration_minutes),
            None => req
                .end_time
                .ok_or_else(|| {
                    AppError::Validation(
                        "end_time is required unless a combo is selected".to_string(),
                    )
                })?
                .trunc_subsecs(0),
        };
        validate_interval(start, end, now, lead)?;

        let add_ons = resolve_add_ons(&state.catalog, &db, &req.add_ons)?;
        let line_prices: Vec<LineItemPrice> = add_ons
            .iter()
            .map(|l| LineItemPrice {
                unit_price: l.unit_price,
                quantity: l.quantity,
            })
            .collect();

        let pricing = pricing::calculate(&PriceInput {
            hourly_rate: resource.hourly_rate,
            combo: combo.as_ref().map(|c| ComboRate {
                duration_minutes: c.duration_minutes,
                price: c.price,
            }),
            duration: end - start,
            add_ons: &line_prices,
            discount: req.discount,
        });

        Booking {
            id: uuid::Uuid::new_v4().to_string(),
            booking_code: booking_code::generate(),
            resource_id: resource.id,
            location_id: resource.location_id,
            start_time: start,
            end_time: end,
            booking_date: start.with_timezone(&offset).date_naive(),
            customer,
            combo_id: combo.map(|c| c.id),
            add_ons,
            pricing,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            payment_method: None,
            payment_transaction_id: None,
            paid_at: None,
            notes: req.notes.filter(|n| !n.trim().is_empty()),
            check_in_time: None,
            check_out_time: None,
            cancelled_at: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    };

    let mut inserted = false;
    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let outcome = {
            let mut db = state.db()?;
            queries::insert_booking_if_free(&mut db, &booking)?
        };
        match outcome {
            InsertOutcome::Inserted => {
                inserted = true;
                break;
            }
            InsertOutcome::Conflict(existing) => {
                tracing::info!(
                    resource_id = %booking.resource_id,
                    conflicting_code = %existing.booking_code,
                    "booking rejected, slot taken"
                );
                return Err(AppError::Conflict {
                    start_time: existing.start_time,
                    end_time: existing.end_time,
                });
            }
            InsertOutcome::DuplicateCode => {
                tracing::warn!(attempt, booking_code = %booking.booking_code, "booking code collision, regenerating");
                booking.booking_code = booking_code::generate();
            }
        }
    }
    if !inserted {
        return Err(AppError::Internal(anyhow::anyhow!(
            "could not allocate a unique booking code"
        )));
    }

    tracing::info!(
        booking_id = %booking.id,
        booking_code = %booking.booking_code,
        resource_id = %booking.resource_id,
        total = booking.pricing.total,
        "booking created"
    );

    let payment = payment_instructions(state, &booking).await;
    Ok(CreatedBooking { booking, payment })
}

async fn payment_instructions(state: &AppState, booking: &Booking) -> PaymentInstructions {
    let bank = &state.config.bank;
    let request = TransferQrRequest {
        bank_bin: bank.bank_bin.clone(),
        account_number: bank.account_number.clone(),
        account_name: bank.account_name.clone(),
        amount: booking.pricing.total,
        memo: booking.booking_code.clone(),
    };

    let qr_data_url = match state.qr.transfer_qr(&request).await {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(booking_code = %booking.booking_code, error = %e, "QR generation failed");
            None
        }
    };

    PaymentInstructions {
        bank_name: bank.bank_name.clone(),
        account_number: request.account_number,
        account_name: request.account_name,
        amount: request.amount,
        memo: request.memo,
        qr_data_url,
        expires_at: booking.created_at + Duration::minutes(state.config.booking_timeout_minutes),
    }
}

// ── Read ──

/// Look a booking up by id, falling back to its booking code.
pub fn get_booking(state: &AppState, id_or_code: &str) -> Result<Booking, AppError> {
    let db = state.db()?;
    let booking = match queries::get_booking_by_id(&db, id_or_code)? {
        Some(b) => Some(b),
        None if booking_code::looks_like_code(id_or_code) => {
            queries::get_booking_by_code(&db, id_or_code)?
        }
        None => None,
    };
    booking.ok_or_else(|| AppError::NotFound(format!("booking {id_or_code}")))
}

pub fn check_availability(
    state: &AppState,
    resource_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Availability, AppError> {
    if end <= start {
        return Err(AppError::Validation(
            "end_time must be after start_time".to_string(),
        ));
    }
    let start = start.trunc_subsecs(0);
    let end = end.trunc_subsecs(0);

    let db = state.db()?;
    state
        .catalog
        .resource(&db, resource_id)?
        .ok_or_else(|| AppError::NotFound(format!("resource {resource_id}")))?;
    let conflict = queries::find_conflict(&db, resource_id, &start, &end, None)?;

    Ok(Availability {
        resource_id: resource_id.to_string(),
        start_time: start,
        end_time: end,
        available: conflict.is_none(),
        conflict: conflict.map(|c| Interval {
            start_time: c.start_time,
            end_time: c.end_time,
        }),
    })
}

// ── Staff updates ──

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBookingRequest {
    pub status: Option<BookingStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_method: Option<String>,
    pub payment_transaction_id: Option<String>,
    pub notes: Option<String>,
    pub check_in_time: Option<DateTime<Utc>>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl UpdateBookingRequest {
    fn reschedules(&self) -> bool {
        self.start_time.is_some() || self.end_time.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedUpdate {
    pub booking: Booking,
    pub became_paid: bool,
    pub rescheduled: bool,
}

/// Compute the booking that results from a staff update, or reject the
/// whole update. `current` is never modified.
pub fn apply_update(
    current: &Booking,
    req: &UpdateBookingRequest,
    now: DateTime<Utc>,
    lead: Duration,
    offset: FixedOffset,
) -> Result<AppliedUpdate, AppError> {
    let mut next = current.clone();
    let mut became_paid = false;

    if req.reschedules() {
        if !matches!(current.status, BookingStatus::Pending | BookingStatus::Confirmed) {
            return Err(AppError::Validation(format!(
                "a {} booking cannot be rescheduled",
                current.status.as_str()
            )));
        }
        let duration = current.duration();
        let start = match (req.start_time, req.end_time) {
            (Some(s), _) => s.trunc_subsecs(0),
            (None, Some(e)) => e.trunc_subsecs(0) - duration,
            (None, None) => current.start_time,
        };
        let end = start + duration;
        if req.end_time.is_some_and(|e| e.trunc_subsecs(0) != end) {
            return Err(AppError::Validation(
                "rescheduling must keep the booked duration".to_string(),
            ));
        }
        validate_interval(start, end, now, lead)?;
        next.start_time = start;
        next.end_time = end;
        next.booking_date = start.with_timezone(&offset).date_naive();
    }

    match req.payment_status {
        Some(PaymentStatus::Paid) if current.payment_status != PaymentStatus::Paid => {
            let method = req
                .payment_method
                .as_deref()
                .unwrap_or(PaymentSource::Counter.as_str());
            let txn = req
                .payment_transaction_id
                .clone()
                .unwrap_or_else(|| format!("counter-{}", current.booking_code));
            lifecycle::mark_paid(&mut next, method, &txn, now)?;
            became_paid = true;
        }
        Some(PaymentStatus::Refunded) => lifecycle::mark_refunded(&mut next, now)?,
        Some(PaymentStatus::Unpaid) if current.payment_status != PaymentStatus::Unpaid => {
            return Err(AppError::InvalidPaymentUpdate(
                "payment status cannot go back to unpaid".to_string(),
            ));
        }
        _ => {}
    }

    if !became_paid && (req.payment_method.is_some() || req.payment_transaction_id.is_some()) {
        if next.payment_status == PaymentStatus::Unpaid {
            return Err(AppError::InvalidPaymentUpdate(
                "payment details can only be set on a paid booking".to_string(),
            ));
        }
        if let Some(method) = &req.payment_method {
            next.payment_method = Some(method.clone());
        }
        if let Some(txn) = &req.payment_transaction_id {
            next.payment_transaction_id = Some(txn.clone());
        }
    }

    if let Some(to) = req.status.filter(|to| *to != next.status) {
        let at = match to {
            BookingStatus::CheckedIn => req.check_in_time.unwrap_or(now),
            BookingStatus::CheckedOut => req.check_out_time.unwrap_or(now),
            _ => now,
        };
        let reason = req
            .cancel_reason
            .clone()
            .or_else(|| Some("cancelled by staff".to_string()));
        lifecycle::transition(&mut next, to, at.trunc_subsecs(0), reason)?;
    }

    if let Some(t) = req.check_in_time {
        if next.check_in_time.is_none() {
            return Err(AppError::Validation(
                "check_in_time can only be set on a checked-in booking".to_string(),
            ));
        }
        next.check_in_time = Some(t.trunc_subsecs(0));
    }
    if let Some(t) = req.check_out_time {
        if next.check_out_time.is_none() {
            return Err(AppError::Validation(
                "check_out_time can only be set on a checked-out booking".to_string(),
            ));
        }
        next.check_out_time = Some(t.trunc_subsecs(0));
    }
    if let Some(reason) = &req.cancel_reason {
        if next.status != BookingStatus::Cancelled {
            return Err(AppError::Validation(
                "cancel_reason can only be set on a cancelled booking".to_string(),
            ));
        }
        next.cancel_reason = Some(reason.clone());
    }
    if let Some(notes) = &req.notes {
        next.notes = Some(notes.trim().to_string()).filter(|n| !n.is_empty());
    }

    next.updated_at = now;
    Ok(AppliedUpdate {
        booking: next,
        became_paid,
        rescheduled: req.reschedules(),
    })
}

pub async fn update_booking(
    state: &AppState,
    id: &str,
    req: UpdateBookingRequest,
    now: DateTime<Utc>,
) -> Result<Booking, AppError> {
    let now = now.trunc_subsecs(0);
    let lead = Duration::minutes(state.config.booking_lead_minutes);
    let offset = business_offset(state.config.business_utc_offset_minutes);

    let applied = {
        let mut db = state.db()?;
        let current = queries::get_booking_by_id(&db, id)?
            .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;
        let applied = apply_update(&current, &req, now, lead, offset)?;
        let next = &applied.booking;

        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if applied.rescheduled && next.status.is_active() {
            if let Some(c) =
                queries::find_conflict(&tx, &next.resource_id, &next.start_time, &next.end_time, Some(&next.id))?
            {
                return Err(AppError::Conflict {
                    start_time: c.start_time,
                    end_time: c.end_time,
                });
            }
        }
        if !queries::update_booking_guarded(&tx, next, current.status, current.payment_status)? {
            return Err(AppError::StaleWrite);
        }
        if applied.became_paid {
            queries::insert_payment_event(
                &tx,
                &NewPaymentEvent {
                    channel: PaymentSource::Counter.as_str(),
                    booking_ref: Some(&next.booking_code),
                    booking_id: Some(&next.id),
                    amount: Some(next.pricing.total),
                    transaction_id: next.payment_transaction_id.as_deref(),
                    outcome: "applied",
                    detail: Some("recorded by staff"),
                    received_at: now,
                },
            )?;
        }
        tx.commit()?;

        tracing::info!(
            booking_id = %current.id,
            from_status = current.status.as_str(),
            to_status = next.status.as_str(),
            payment_status = next.payment_status.as_str(),
            "booking updated by staff"
        );
        applied
    };

    if applied.became_paid {
        if let Err(e) = state.notifier.booking_confirmed(&applied.booking).await {
            tracing::warn!(booking_code = %applied.booking.booking_code, error = %e, "confirmation notification failed");
        }
    }
    Ok(applied.booking)
}

/// Customer or staff soft-cancel.
pub fn cancel_booking(
    state: &AppState,
    id: &str,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<Booking, AppError> {
    let now = now.trunc_subsecs(0);
    let db = state.db()?;
    let mut booking = queries::get_booking_by_id(&db, id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;
    let (status, payment_status) = (booking.status, booking.payment_status);

    let reason = reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "cancelled by customer".to_string());
    lifecycle::transition(&mut booking, BookingStatus::Cancelled, now, Some(reason))?;

    if !queries::update_booking_guarded(&db, &booking, status, payment_status)? {
        return Err(AppError::StaleWrite);
    }
    tracing::info!(booking_id = %booking.id, booking_code = %booking.booking_code, "booking cancelled");
    Ok(booking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::lifecycle::tests::sample_booking;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 16, 5, 0, 0).unwrap()
    }

    fn ict() -> FixedOffset {
        business_offset(7 * 60)
    }

    fn customer() -> CustomerInput {
        CustomerInput {
            name: "  Lan  ".into(),
            phone: "+84901234567".into(),
            email: Some("".into()),
            national_id: "012345678901".into(),
        }
    }

    #[test]
    fn test_customer_is_trimmed() {
        let c = validate_customer(&customer()).unwrap();
        assert_eq!(c.name, "Lan");
        assert_eq!(c.email, None);
    }

    #[test]
    fn test_customer_rejects_bad_fields() {
        let bad_phone = CustomerInput {
            phone: "12-34".into(),
            ..customer()
        };
        assert!(matches!(validate_customer(&bad_phone), Err(AppError::Validation(_))));

        let bad_id = CustomerInput {
            national_id: "1234567890".into(),
            ..customer()
        };
        assert!(matches!(validate_customer(&bad_id), Err(AppError::Validation(_))));

        let bad_email = CustomerInput {
            email: Some("lan.example.com".into()),
            ..customer()
        };
        assert!(validate_customer(&bad_email).is_err());

        let long_name = CustomerInput {
            name: "x".repeat(101),
            ..customer()
        };
        assert!(validate_customer(&long_name).is_err());
    }

    #[test]
    fn test_interval_rules() {
        let lead = Duration::minutes(5);
        let start = now() + Duration::hours(2);
        assert!(validate_interval(start, start + Duration::hours(1), now(), lead).is_ok());
        assert!(validate_interval(start, start, now(), lead).is_err());
        assert!(validate_interval(start, start + Duration::minutes(59), now(), lead).is_err());

        let too_soon = now() + Duration::minutes(4);
        assert!(validate_interval(too_soon, too_soon + Duration::hours(1), now(), lead).is_err());
        let just_enough = now() + Duration::minutes(5);
        assert!(validate_interval(just_enough, just_enough + Duration::hours(1), now(), lead).is_ok());
    }

    #[test]
    fn test_counter_payment_confirms() {
        let current = sample_booking(BookingStatus::Pending, PaymentStatus::Unpaid);
        let req = UpdateBookingRequest {
            payment_status: Some(PaymentStatus::Paid),
            ..Default::default()
        };
        let applied = apply_update(&current, &req, now(), Duration::minutes(5), ict()).unwrap();
        assert!(applied.became_paid);
        assert_eq!(applied.booking.status, BookingStatus::Confirmed);
        assert_eq!(applied.booking.payment_method.as_deref(), Some("counter"));
        assert_eq!(
            applied.booking.payment_transaction_id.as_deref(),
            Some("counter-BK000000000001")
        );
    }

    #[test]
    fn test_paid_plus_confirmed_status_is_accepted() {
        let current = sample_booking(BookingStatus::Pending, PaymentStatus::Unpaid);
        let req = UpdateBookingRequest {
            status: Some(BookingStatus::Confirmed),
            payment_status: Some(PaymentStatus::Paid),
            payment_method: Some("cash".into()),
            ..Default::default()
        };
        let applied = apply_update(&current, &req, now(), Duration::minutes(5), ict()).unwrap();
        assert_eq!(applied.booking.status, BookingStatus::Confirmed);
        assert_eq!(applied.booking.payment_method.as_deref(), Some("cash"));
    }

    #[test]
    fn test_downgrade_to_unpaid_rejected() {
        let current = sample_booking(BookingStatus::Confirmed, PaymentStatus::Paid);
        let req = UpdateBookingRequest {
            payment_status: Some(PaymentStatus::Unpaid),
            ..Default::default()
        };
        let err = apply_update(&current, &req, now(), Duration::minutes(5), ict()).unwrap_err();
        assert!(matches!(err, AppError::InvalidPaymentUpdate(_)));
    }

    #[test]
    fn test_refund_then_cancel_in_one_update() {
        let current = sample_booking(BookingStatus::Confirmed, PaymentStatus::Paid);
        let req = UpdateBookingRequest {
            status: Some(BookingStatus::Cancelled),
            payment_status: Some(PaymentStatus::Refunded),
            cancel_reason: Some("customer sick".into()),
            ..Default::default()
        };
        let applied = apply_update(&current, &req, now(), Duration::minutes(5), ict()).unwrap();
        assert_eq!(applied.booking.status, BookingStatus::Cancelled);
        assert_eq!(applied.booking.payment_status, PaymentStatus::Refunded);
        assert_eq!(applied.booking.cancel_reason.as_deref(), Some("customer sick"));
    }

    #[test]
    fn test_failed_update_is_all_or_nothing() {
        let current = sample_booking(BookingStatus::CheckedOut, PaymentStatus::Paid);
        let req = UpdateBookingRequest {
            notes: Some("late".into()),
            status: Some(BookingStatus::Cancelled),
            ..Default::default()
        };
        let err = apply_update(&current, &req, now(), Duration::minutes(5), ict()).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn test_reschedule_keeps_duration() {
        let current = sample_booking(BookingStatus::Confirmed, PaymentStatus::Paid);
        let new_start = current.start_time + Duration::days(1);
        let req = UpdateBookingRequest {
            start_time: Some(new_start),
            ..Default::default()
        };
        let applied = apply_update(&current, &req, now(), Duration::minutes(5), ict()).unwrap();
        assert!(applied.rescheduled);
        assert_eq!(applied.booking.end_time, new_start + Duration::hours(2));
        assert_eq!(applied.booking.pricing, current.pricing);
        assert_eq!(applied.booking.booking_date, new_start.date_naive());

        let stretched = UpdateBookingRequest {
            start_time: Some(new_start),
            end_time: Some(new_start + Duration::hours(3)),
            ..Default::default()
        };
        assert!(apply_update(&current, &stretched, now(), Duration::minutes(5), ict()).is_err());
    }

    #[test]
    fn test_checked_in_cannot_reschedule() {
        let current = sample_booking(BookingStatus::CheckedIn, PaymentStatus::Paid);
        let req = UpdateBookingRequest {
            start_time: Some(current.start_time + Duration::hours(1)),
            ..Default::default()
        };
        assert!(apply_update(&current, &req, now(), Duration::minutes(5), ict()).is_err());
    }

    #[test]
    fn test_check_in_uses_given_time() {
        let current = sample_booking(BookingStatus::Confirmed, PaymentStatus::Paid);
        let at = current.start_time - Duration::minutes(3);
        let req = UpdateBookingRequest {
            status: Some(BookingStatus::CheckedIn),
            check_in_time: Some(at),
            ..Default::default()
        };
        let applied = apply_update(&current, &req, now(), Duration::minutes(5), ict()).unwrap();
        assert_eq!(applied.booking.check_in_time, Some(at));
    }
}
