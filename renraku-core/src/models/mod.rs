//! Domain models for renraku.
//!
//! ## Submodules
//!
//! - [`record`] - The submission record and the form it is posted in
//! - [`calendar`] - Entry dates in the portal's reference timezone

mod calendar;
mod record;

pub use calendar::{date_in, today_in, DEFAULT_TIMEZONE};
pub use record::{split_temperature, SubmissionForm, SubmissionRecord, DERIVED_FIELDS, FIELD_NAMES};
