use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a payment confirmation came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSource {
    Gateway,
    BankTransfer,
    Counter,
}

impl PaymentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentSource::Gateway => "gateway",
            PaymentSource::BankTransfer => "bank_transfer",
            PaymentSource::Counter => "counter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingRef {
    Id(String),
    Code(String),
}

impl BookingRef {
    pub fn as_str(&self) -> &str {
        match self {
            BookingRef::Id(s) | BookingRef::Code(s) => s,
        }
    }
}

/// A payment signal from either channel, normalized before reconciliation.
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    pub source: PaymentSource,
    pub booking_ref: BookingRef,
    pub amount: i64,
    pub transaction_id: String,
}

/// Row of the `payment_events` audit ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEventRecord {
    pub id: i64,
    pub channel: String,
    pub booking_ref: Option<String>,
    pub booking_id: Option<String>,
    pub amount: Option<i64>,
    pub transaction_id: Option<String>,
    pub outcome: String,
    pub detail: Option<String>,
    pub received_at: DateTime<Utc>,
}
