//! Price computation for a booking.
//!
//! Amounts are whole currency units (VND has no minor unit). The result is
//! computed once at creation and stored; it is only recomputed to verify.

use chrono::Duration;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComboRate {
    pub duration_minutes: i64,
    pub price: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineItemPrice {
    pub unit_price: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct PriceInput<'a> {
    pub hourly_rate: i64,
    pub combo: Option<ComboRate>,
    pub duration: Duration,
    pub add_ons: &'a [LineItemPrice],
    pub discount: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PriceBreakdown {
    pub resource_subtotal: i64,
    pub add_on_subtotal: i64,
    pub subtotal: i64,
    pub tax: i64,
    pub discount: i64,
    pub total: i64,
}

/// Billable hours for an hourly booking: started hours are charged in full.
pub fn billable_hours(duration: Duration) -> i64 {
    let secs = duration.num_seconds().max(0);
    (secs + 3599) / 3600
}

/// Tax is not charged today; kept as its own line so the breakdown format
/// does not change when it is.
fn tax_for(_subtotal: i64) -> i64 {
    0
}

pub fn calculate(input: &PriceInput<'_>) -> PriceBreakdown {
    let resource_subtotal = match input.combo {
        Some(combo) => combo.price,
        None => input
            .hourly_rate
            .saturating_mul(billable_hours(input.duration)),
    };

    let add_on_subtotal = input.add_ons.iter().fold(0i64, |acc, line| {
        acc.saturating_add(line.unit_price.saturating_mul(line.quantity))
    });

    let subtotal = resource_subtotal.saturating_add(add_on_subtotal);
    let tax = tax_for(subtotal);
    let discount = input.discount.max(0);
    let total = subtotal.saturating_add(tax).saturating_sub(discount).max(0);

    PriceBreakdown {
        resource_subtotal,
        add_on_subtotal,
        subtotal,
        tax,
        discount,
        total,
    }
}
