pub mod sms;

use async_trait::async_trait;

use crate::models::Booking;
use crate::services::business_offset;

/// Tells the customer their booking is confirmed. Called once, by the write
/// that actually moved the booking to paid.
#[async_trait]
pub trait BookingNotifier: Send + Sync {
    async fn booking_confirmed(&self, booking: &Booking) -> anyhow::Result<()>;
}

pub struct LogNotifier;

#[async_trait]
impl BookingNotifier for LogNotifier {
    async fn booking_confirmed(&self, booking: &Booking) -> anyhow::Result<()> {
        tracing::info!(
            booking_code = %booking.booking_code,
            phone = %booking.customer.phone,
            "booking confirmed (no notifier configured)"
        );
        Ok(())
    }
}

pub fn confirmation_text(booking: &Booking, utc_offset_minutes: i32) -> String {
    let offset = business_offset(utc_offset_minutes);
    let start = booking.start_time.with_timezone(&offset);
    let end = booking.end_time.with_timezone(&offset);
    format!(
        "Booking {} confirmed: {} {}-{}. Total paid {}. Show this code at check-in.",
        booking.booking_code,
        start.format("%d/%m/%Y"),
        start.format("%H:%M"),
        end.format("%H:%M"),
        booking.pricing.total,
    )
}
