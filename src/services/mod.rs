pub mod booking_code;
pub mod bookings;
pub mod cache;
pub mod catalog;
pub mod lifecycle;
pub mod notify;
pub mod payment_qr;
pub mod pricing;
pub mod reconciler;
pub mod sweeper;

use chrono::{FixedOffset, Offset, Utc};

/// Local offset of the business, used for `booking_date` and customer-facing
/// times. Out-of-range values fall back to UTC.
pub fn business_offset(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
}
