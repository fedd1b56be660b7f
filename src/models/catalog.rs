use serde::{Deserialize, Serialize};

/// A bookable room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    pub id: String,
    pub location_id: String,
    pub name: String,
    pub hourly_rate: i64,
    pub is_active: bool,
}

/// Fixed-duration, fixed-price package that replaces hourly billing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Combo {
    pub id: String,
    pub name: String,
    pub duration_minutes: i64,
    pub price: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub is_active: bool,
}
