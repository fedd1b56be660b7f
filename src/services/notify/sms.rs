use anyhow::Context;
use async_trait::async_trait;

use super::{confirmation_text, BookingNotifier};
use crate::models::Booking;

/// Sends the confirmation by SMS through the Twilio REST API.
pub struct SmsNotifier {
    account_sid: String,
    auth_token: String,
    from_number: String,
    utc_offset_minutes: i32,
    client: reqwest::Client,
}

impl SmsNotifier {
    pub fn new(
        account_sid: String,
        auth_token: String,
        from_number: String,
        utc_offset_minutes: i32,
    ) -> Self {
        Self {
            account_sid,
            auth_token,
            from_number,
            utc_offset_minutes,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl BookingNotifier for SmsNotifier {
    async fn booking_confirmed(&self, booking: &Booking) -> anyhow::Result<()> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );
        let body = confirmation_text(booking, self.utc_offset_minutes);

        self.client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("To", booking.customer.phone.as_str()),
                ("From", self.from_number.as_str()),
                ("Body", body.as_str()),
            ])
            .send()
            .await
            .context("failed to send confirmation SMS")?
            .error_for_status()
            .context("SMS API returned error")?;

        Ok(())
    }
}
