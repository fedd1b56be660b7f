pub mod booking;
pub mod catalog;
pub mod payment;

pub use booking::{AddOnLine, Booking, BookingStatus, CustomerSnapshot, PaymentStatus};
pub use catalog::{Combo, MenuItem, Resource};
pub use payment::{BookingRef, PaymentEvent, PaymentEventRecord, PaymentSource};
