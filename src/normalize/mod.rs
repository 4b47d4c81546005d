//! Normalization of locale-formatted metric text.
//!
//! Platforms render counts as "1.2만", "3.4K" or "2,300" and dates as
//! "3일 전", "2 weeks ago" or "2025-01-15" depending on account locale.
//! These are pure functions: no I/O, no state.

mod date;
mod magnitude;

pub use date::{date_from_epoch_secs, parse_date, parse_date_at};
pub use magnitude::parse_magnitude;
