//! Booking status state machine.
//!
//! Every function here works on an in-memory copy of the booking and either
//! mutates it completely or returns an error leaving it untouched. Callers
//! persist the result with a write guarded on the status and payment status
//! they loaded.

use chrono::{DateTime, Utc};

use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, PaymentStatus};

/// Legal manual/system edges. Entering `Confirmed` through payment goes via
/// [`mark_paid`] instead.
pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Confirmed, CheckedIn)
            | (CheckedIn, CheckedOut)
            | (Pending, Cancelled)
            | (Confirmed, Cancelled)
    )
}

pub fn transition(
    booking: &mut Booking,
    to: BookingStatus,
    at: DateTime<Utc>,
    cancel_reason: Option<String>,
) -> Result<(), AppError> {
    let from = booking.status;
    if !can_transition(from, to) {
        let reason = match (from, to) {
            (a, b) if a == b => "booking is already in that status".to_string(),
            (BookingStatus::CheckedIn | BookingStatus::CheckedOut, BookingStatus::Cancelled) => {
                "an occupied or finished booking cannot be cancelled".to_string()
            }
            (BookingStatus::Cancelled, _) => "cancelled bookings are final".to_string(),
            _ => "transition is not allowed".to_string(),
        };
        return Err(AppError::InvalidTransition { from, to, reason });
    }

    if to == BookingStatus::Cancelled && booking.payment_status == PaymentStatus::Paid {
        return Err(AppError::InvalidTransition {
            from,
            to,
            reason: "booking is paid; record a refund before cancelling".to_string(),
        });
    }

    // Only pending and confirmed may be unpaid. A guest refunded while in the
    // room can still be checked out.
    let payment_ok = match to {
        BookingStatus::CheckedIn => booking.payment_status == PaymentStatus::Paid,
        BookingStatus::CheckedOut => booking.payment_status != PaymentStatus::Unpaid,
        _ => true,
    };
    if !payment_ok {
        return Err(AppError::InvalidTransition {
            from,
            to,
            reason: "booking is not paid".to_string(),
        });
    }

    booking.status = to;
    booking.updated_at = at;
    match to {
        BookingStatus::CheckedIn => booking.check_in_time = Some(at),
        BookingStatus::CheckedOut => booking.check_out_time = Some(at),
        BookingStatus::Cancelled => {
            booking.cancelled_at = Some(at);
            booking.cancel_reason = cancel_reason;
        }
        BookingStatus::Pending | BookingStatus::Confirmed => {}
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaidTransition {
    Applied,
    AlreadyPaid,
}

/// Record a successful payment: `paid` + `confirmed` together.
pub fn mark_paid(
    booking: &mut Booking,
    method: &str,
    transaction_id: &str,
    at: DateTime<Utc>,
) -> Result<PaidTransition, AppError> {
    match booking.payment_status {
        PaymentStatus::Paid => return Ok(PaidTransition::AlreadyPaid),
        PaymentStatus::Refunded => {
            return Err(AppError::InvalidPaymentUpdate(
                "booking was refunded and cannot be paid again".to_string(),
            ))
        }
        PaymentStatus::Unpaid => {}
    }

    if !matches!(
        booking.status,
        BookingStatus::Pending | BookingStatus::Confirmed
    ) {
        return Err(AppError::InvalidPaymentUpdate(format!(
            "a {} booking cannot take a payment",
            booking.status.as_str()
        )));
    }

    booking.payment_status = PaymentStatus::Paid;
    booking.status = BookingStatus::Confirmed;
    booking.payment_method = Some(method.to_string());
    booking.payment_transaction_id = Some(transaction_id.to_string());
    booking.paid_at = Some(at);
    booking.updated_at = at;
    Ok(PaidTransition::Applied)
}

/// Record that a paid booking was refunded outside this system.
pub fn mark_refunded(booking: &mut Booking, at: DateTime<Utc>) -> Result<(), AppError> {
    match booking.payment_status {
        PaymentStatus::Paid => {
            booking.payment_status = PaymentStatus::Refunded;
            booking.updated_at = at;
            Ok(())
        }
        PaymentStatus::Refunded => Ok(()),
        PaymentStatus::Unpaid => Err(AppError::InvalidPaymentUpdate(
            "only a paid booking can be refunded".to_string(),
        )),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::CustomerSnapshot;
    use crate::services::pricing::PriceBreakdown;
    use chrono::{Duration, TimeZone};

    pub(crate) fn sample_booking(status: BookingStatus, payment: PaymentStatus) -> Booking {
        let start = Utc.with_ymd_and_hms(2025, 6, 16, 7, 0, 0).unwrap();
        let created = start - Duration::days(1);
        Booking {
            id: "b-1".to_string(),
            booking_code: "BK000000000001".to_string(),
            resource_id: "room-1".to_string(),
            location_id: "branch-1".to_string(),
            start_time: start,
            end_time: start + Duration::hours(2),
            booking_date: start.date_naive(),
            customer: CustomerSnapshot {
                name: "Lan".to_string(),
                phone: "0901234567".to_string(),
                email: None,
                national_id: "012345678901".to_string(),
            },
            combo_id: None,
            add_ons: vec![],
            pricing: PriceBreakdown {
                resource_subtotal: 160_000,
                subtotal: 160_000,
                total: 160_000,
                ..Default::default()
            },
            status,
            payment_status: payment,
            payment_method: None,
            payment_transaction_id: None,
            paid_at: None,
            notes: None,
            check_in_time: None,
            check_out_time: None,
            cancelled_at: None,
            cancel_reason: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 16, 6, 0, 0).unwrap()
    }

    #[test]
    fn test_happy_path() {
        let mut b = sample_booking(BookingStatus::Pending, PaymentStatus::Unpaid);
        assert_eq!(
            mark_paid(&mut b, "gateway", "txn-1", now()).unwrap(),
            PaidTransition::Applied
        );
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert_eq!(b.payment_status, PaymentStatus::Paid);

        transition(&mut b, BookingStatus::CheckedIn, now(), None).unwrap();
        assert_eq!(b.check_in_time, Some(now()));
        transition(&mut b, BookingStatus::CheckedOut, now(), None).unwrap();
        assert_eq!(b.status, BookingStatus::CheckedOut);
        assert_eq!(b.check_out_time, Some(now()));
    }

    #[test]
    fn test_cancel_checked_out_leaves_booking_untouched() {
        let mut b = sample_booking(BookingStatus::CheckedOut, PaymentStatus::Paid);
        let before = b.clone();
        let err = transition(&mut b, BookingStatus::Cancelled, now(), Some("x".into()));
        assert!(matches!(err, Err(AppError::InvalidTransition { .. })));
        assert_eq!(b, before);
    }

    #[test]
    fn test_check_in_requires_confirmed() {
        let mut b = sample_booking(BookingStatus::Pending, PaymentStatus::Unpaid);
        assert!(transition(&mut b, BookingStatus::CheckedIn, now(), None).is_err());
        assert_eq!(b.status, BookingStatus::Pending);
    }

    #[test]
    fn test_unpaid_booking_cannot_be_checked_in() {
        let mut b = sample_booking(BookingStatus::Confirmed, PaymentStatus::Unpaid);
        let before = b.clone();
        let err = transition(&mut b, BookingStatus::CheckedIn, now(), None);
        assert!(matches!(err, Err(AppError::InvalidTransition { .. })));
        assert_eq!(b, before);

        let mut refunded = sample_booking(BookingStatus::Confirmed, PaymentStatus::Refunded);
        assert!(transition(&mut refunded, BookingStatus::CheckedIn, now(), None).is_err());
    }

    #[test]
    fn test_refunded_guest_can_still_check_out() {
        let mut b = sample_booking(BookingStatus::CheckedIn, PaymentStatus::Paid);
        mark_refunded(&mut b, now()).unwrap();
        transition(&mut b, BookingStatus::CheckedOut, now(), None).unwrap();
        assert_eq!(b.status, BookingStatus::CheckedOut);

        let mut unpaid = sample_booking(BookingStatus::CheckedIn, PaymentStatus::Unpaid);
        assert!(transition(&mut unpaid, BookingStatus::CheckedOut, now(), None).is_err());
        assert_eq!(unpaid.status, BookingStatus::CheckedIn);
    }

    #[test]
    fn test_paid_booking_needs_refund_before_cancel() {
        let mut b = sample_booking(BookingStatus::Confirmed, PaymentStatus::Paid);
        assert!(transition(&mut b, BookingStatus::Cancelled, now(), None).is_err());

        mark_refunded(&mut b, now()).unwrap();
        transition(&mut b, BookingStatus::Cancelled, now(), Some("customer".into())).unwrap();
        assert_eq!(b.status, BookingStatus::Cancelled);
        assert_eq!(b.payment_status, PaymentStatus::Refunded);
        assert_eq!(b.cancel_reason.as_deref(), Some("customer"));
    }

    #[test]
    fn test_mark_paid_twice_is_noop() {
        let mut b = sample_booking(BookingStatus::Pending, PaymentStatus::Unpaid);
        mark_paid(&mut b, "gateway", "txn-1", now()).unwrap();
        let after_first = b.clone();
        assert_eq!(
            mark_paid(&mut b, "bank_transfer", "txn-2", now()).unwrap(),
            PaidTransition::AlreadyPaid
        );
        assert_eq!(b, after_first);
    }

    #[test]
    fn test_cancelled_booking_cannot_be_paid() {
        let mut b = sample_booking(BookingStatus::Cancelled, PaymentStatus::Unpaid);
        assert!(mark_paid(&mut b, "gateway", "txn", now()).is_err());
        assert_eq!(b.payment_status, PaymentStatus::Unpaid);
    }

    #[test]
    fn test_cannot_refund_unpaid() {
        let mut b = sample_booking(BookingStatus::Pending, PaymentStatus::Unpaid);
        assert!(mark_refunded(&mut b, now()).is_err());
    }
}
