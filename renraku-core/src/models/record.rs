//! The contact-book submission record.
//!
//! This module contains:
//! - [`SubmissionRecord`] - One day's contact-book entry, serialized as the save-data blob
//! - [`SubmissionForm`] - The two-field form posted to the registration endpoint
//! - [`split_temperature`] - Decomposition of a raw `36.7` style reading

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ============================================================================
// Field Names
// ============================================================================

/// Save-data keys in the order the portal's own form emits them.
///
/// Several names are misspelled upstream (`*_minus`, `breakfirst_*`) and
/// must be sent exactly as written here.
pub const FIELD_NAMES: [&str; 31] = [
    "date_month",
    "date_day",
    "moody_lastnight",
    "defecation_lastnight_count",
    "defecation_lastnight",
    "dinner_hour",
    "dinner_minus",
    "dinner_comment",
    "bathing",
    "sleep_hour",
    "sleep_minus",
    "wakeup_hour",
    "wakeup_minus",
    "moody_morning",
    "defecation_morning_count",
    "defecation_morning",
    "breakfirst_hour",
    "breakfirst_minus",
    "breakfirst_comment",
    "thermometry_hour",
    "thermometry_minus",
    "thermometry_pre",
    "thermometry_after",
    "swimming",
    "appearance",
    "message",
    "relationship_id",
    "pickup_hour",
    "pickup_minus",
    "save_state",
    "thermometry",
];

/// Fields that are always recomputed before submission.
pub const DERIVED_FIELDS: [&str; 4] = [
    "date_month",
    "date_day",
    "thermometry_pre",
    "thermometry_after",
];

// ============================================================================
// Submission Record
// ============================================================================

/// One day's contact-book entry.
///
/// Every field is a string, and every field is always serialized, because the
/// registration endpoint expects a complete form. Field order is fixed by the
/// struct so the JSON encoding is byte-stable for identical input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionRecord {
    /// Month of the entry, two digits.
    pub date_month: String,
    /// Day of the entry, two digits.
    pub date_day: String,
    /// Mood last night (enumerated code).
    pub moody_lastnight: String,
    /// Bowel movements last night.
    pub defecation_lastnight_count: String,
    /// Bowel movement state last night (enumerated code).
    pub defecation_lastnight: String,
    /// Dinner hour.
    pub dinner_hour: String,
    /// Dinner minute.
    #[serde(rename = "dinner_minus")]
    pub dinner_minute: String,
    /// Free-text dinner comment.
    pub dinner_comment: String,
    /// Bathing state (enumerated code).
    pub bathing: String,
    /// Bedtime hour.
    pub sleep_hour: String,
    /// Bedtime minute.
    #[serde(rename = "sleep_minus")]
    pub sleep_minute: String,
    /// Wake-up hour.
    pub wakeup_hour: String,
    /// Wake-up minute.
    #[serde(rename = "wakeup_minus")]
    pub wakeup_minute: String,
    /// Mood this morning (enumerated code).
    pub moody_morning: String,
    /// Bowel movements this morning.
    pub defecation_morning_count: String,
    /// Bowel movement state this morning (enumerated code).
    pub defecation_morning: String,
    /// Breakfast hour.
    #[serde(rename = "breakfirst_hour")]
    pub breakfast_hour: String,
    /// Breakfast minute.
    #[serde(rename = "breakfirst_minus")]
    pub breakfast_minute: String,
    /// Free-text breakfast comment.
    #[serde(rename = "breakfirst_comment")]
    pub breakfast_comment: String,
    /// Hour the temperature was taken.
    pub thermometry_hour: String,
    /// Minute the temperature was taken.
    #[serde(rename = "thermometry_minus")]
    pub thermometry_minute: String,
    /// Integer part of the temperature.
    pub thermometry_pre: String,
    /// Fractional part of the temperature.
    pub thermometry_after: String,
    /// Swimming allowed: `1` no, `2` yes.
    pub swimming: String,
    /// Free-text note on the child's condition.
    pub appearance: String,
    /// Free-text message to staff.
    pub message: String,
    /// Who picks the child up (relationship label).
    pub relationship_id: String,
    /// Pickup hour.
    pub pickup_hour: String,
    /// Pickup minute.
    #[serde(rename = "pickup_minus")]
    pub pickup_minute: String,
    /// Save state code (`2` registers the entry).
    pub save_state: String,
    /// Raw temperature reading, e.g. `36.7`.
    pub thermometry: String,
}

impl SubmissionRecord {
    /// The fixed record used by the static source.
    ///
    /// Date and temperature parts are placeholders; [`Self::finalize`]
    /// overwrites them.
    pub fn static_defaults() -> Self {
        Self {
            date_month: String::new(),
            date_day: String::new(),
            moody_lastnight: "1".to_string(),
            defecation_lastnight_count: "0".to_string(),
            defecation_lastnight: "0".to_string(),
            dinner_hour: "19".to_string(),
            dinner_minute: "00".to_string(),
            dinner_comment: "食べました。".to_string(),
            bathing: "2".to_string(),
            sleep_hour: "20".to_string(),
            sleep_minute: "30".to_string(),
            wakeup_hour: "06".to_string(),
            wakeup_minute: "30".to_string(),
            moody_morning: "1".to_string(),
            defecation_morning_count: "0".to_string(),
            defecation_morning: "0".to_string(),
            breakfast_hour: "07".to_string(),
            breakfast_minute: "00".to_string(),
            breakfast_comment: "食べました。".to_string(),
            thermometry_hour: "07".to_string(),
            thermometry_minute: "30".to_string(),
            thermometry_pre: String::new(),
            thermometry_after: String::new(),
            swimming: "1".to_string(),
            appearance: "いつも通りです。".to_string(),
            message: String::new(),
            relationship_id: "父".to_string(),
            pickup_hour: "17".to_string(),
            pickup_minute: "50".to_string(),
            save_state: "2".to_string(),
            thermometry: "36.7".to_string(),
        }
    }

    /// Builds a record from a flat name → value map.
    ///
    /// Unknown keys are ignored. Returns the record together with the names
    /// of non-derived fields the map did not contain; those are left empty.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Serialization` if the map cannot be decoded.
    pub fn from_fields(
        fields: &BTreeMap<String, String>,
    ) -> Result<(Self, Vec<&'static str>), CoreError> {
        let object: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .filter(|(name, _)| FIELD_NAMES.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), serde_json::Value::String(value.clone())))
            .collect();

        let missing = FIELD_NAMES
            .iter()
            .copied()
            .filter(|name| !DERIVED_FIELDS.contains(name) && !fields.contains_key(*name))
            .collect();

        let record = serde_json::from_value(serde_json::Value::Object(object))?;
        Ok((record, missing))
    }

    /// Sets `date_month` and `date_day` from the given date, zero padded.
    pub fn apply_date(&mut self, date: NaiveDate) {
        self.date_month = date.format("%m").to_string();
        self.date_day = date.format("%d").to_string();
    }

    /// Splits `thermometry` into `thermometry_pre` and `thermometry_after`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MalformedTemperature` unless the raw value is two
    /// non-empty digit groups separated by exactly one `.`.
    pub fn decompose_temperature(&mut self) -> Result<(), CoreError> {
        let (pre, after) = split_temperature(&self.thermometry)?;
        self.thermometry_pre = pre.to_string();
        self.thermometry_after = after.to_string();
        Ok(())
    }

    /// Applies the date and temperature overlay, producing a record that is
    /// ready to submit.
    ///
    /// # Errors
    ///
    /// Fails if the temperature is malformed; the record is consumed either way.
    pub fn finalize(mut self, date: NaiveDate) -> Result<Self, CoreError> {
        self.apply_date(date);
        self.decompose_temperature()?;
        Ok(self)
    }

    /// Encodes the record as the save-data blob.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Serialization` if JSON encoding fails.
    pub fn to_save_data(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Splits a raw temperature such as `36.7` into `("36", "7")`.
///
/// # Errors
///
/// Returns `CoreError::MalformedTemperature` for a missing or repeated `.`,
/// an empty side, or non-digit characters.
pub fn split_temperature(raw: &str) -> Result<(&str, &str), CoreError> {
    let malformed = || CoreError::MalformedTemperature(raw.to_string());

    let mut parts = raw.split('.');
    let (Some(pre), Some(after), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed());
    };

    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(pre) || !is_digits(after) {
        return Err(malformed());
    }

    Ok((pre, after))
}

// ============================================================================
// Submission Form
// ============================================================================

/// The form posted to the registration endpoint.
///
/// The portal takes the whole record as one opaque JSON field plus the child
/// identifier, never one form field per record attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionForm {
    /// JSON-encoded [`SubmissionRecord`].
    pub save_data: String,
    /// Child identifier, passed through unchanged.
    pub child_id: String,
}

impl SubmissionForm {
    /// Encodes `record` and pairs it with `child_id`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Serialization` if the record cannot be encoded.
    pub fn new(record: &SubmissionRecord, child_id: &str) -> Result<Self, CoreError> {
        Ok(Self {
            save_data: record.to_save_data()?,
            child_id: child_id.to_string(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
