//! CLI command implementations.

pub mod check;
pub mod run;
pub mod serve;
pub mod show;

use chrono::NaiveDate;
use renraku_core::{today_in, Config};

/// Entry date: the override if given, otherwise today in the configured zone.
pub fn entry_date(config: &Config, date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| today_in(config.timezone))
}
