//! Derived field evaluation.
//!
//! Derived values are recomputed from the current value set in a single
//! pass. Parents are never derived themselves (enforced at authoring time),
//! so one pass always reaches a fixed point.

use chrono::{DateTime, Datelike, Local, NaiveDate};
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{DerivedSpec, FieldDefinition, FieldValue, ValueSet};

/// Source of "today" for age calculations.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// The local calendar date of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Why a derived value could not be computed. Never leaves this module.
#[derive(Debug, Error)]
enum DerivationError {
    #[error("field is not derived")]
    NotDerived,
    #[error("cannot parse {0:?} as a date")]
    UnparseableDate(String),
}

/// Compute the value of a derived field from `values`.
///
/// Missing, malformed or future parents produce an empty string; this
/// function never fails. Non-derived fields also yield an empty string.
pub fn compute_derived_value(
    field: &FieldDefinition,
    values: &ValueSet,
    clock: &dyn Clock,
) -> FieldValue {
    match try_compute(field, values, clock.today()) {
        Ok(value) => FieldValue::Text(value),
        Err(err) => {
            warn!(field = %field.id, error = %err, "derived value unavailable");
            FieldValue::Text(String::new())
        }
    }
}

/// Recompute every derived field against the incoming `values`.
///
/// All derived fields read the pre-recompute values. Returns the merged
/// value set and whether any derived value changed.
pub fn update_derived_fields(
    values: &ValueSet,
    fields: &[FieldDefinition],
    clock: &dyn Clock,
) -> (ValueSet, bool) {
    let mut updated = values.clone();
    let mut has_changes = false;

    for field in fields.iter().filter(|f| f.is_derived) {
        let computed = compute_derived_value(field, values, clock);
        if updated.get(&field.id) != Some(&computed) {
            debug!(field = %field.id, value = %computed, "derived value changed");
            updated.insert(field.id.clone(), computed);
            has_changes = true;
        }
    }

    (updated, has_changes)
}

/// Parse a stored date value. Accepts `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

/// Whole calendar years between `birth` and `today`, or `None` if `birth` is
/// in the future.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    if birth > today {
        return None;
    }
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

fn try_compute(
    field: &FieldDefinition,
    values: &ValueSet,
    today: NaiveDate,
) -> Result<String, DerivationError> {
    let spec = match (field.is_derived, &field.derived_spec) {
        (true, Some(spec)) => spec,
        _ => return Err(DerivationError::NotDerived),
    };

    match spec {
        DerivedSpec::AgeFromDob { parent_field } => {
            let raw = values.get(parent_field).map(FieldValue::as_text);
            let raw = match raw {
                Some(s) if !s.trim().is_empty() => s,
                _ => return Ok(String::new()),
            };
            let birth = parse_date(&raw).ok_or(DerivationError::UnparseableDate(raw))?;
            Ok(age_on(birth, today)
                .map(|years| years.to_string())
                .unwrap_or_default())
        }
        DerivedSpec::FullName {
            first_name_field,
            last_name_field,
        } => {
            let first = values
                .get(first_name_field)
                .map(FieldValue::as_text)
                .unwrap_or_default();
            let last = values
                .get(last_name_field)
                .map(FieldValue::as_text)
                .unwrap_or_default();
            Ok(format!("{} {}", first, last).trim().to_string())
        }
    }
}
