//! Per-year parameter grid
//!
//! Each assignment row carries five parallel arrays indexed by project year.
//! [`YearlyGrid`] keeps them the same length as the project's [`YearSpan`];
//! callers can only change one cell at a time or re-align the whole grid to a
//! new span.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::{AssignmentError, AssignmentResult};

pub const DEFAULT_QUANTITY: u32 = 1;
pub const DEFAULT_PROCESS_TIME: f64 = 0.0;
/// Time & Material work packages start with no management overhead.
pub const DEFAULT_MNG: f64 = 0.0;

/// Inclusive range of calendar years covered by a project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct YearSpan {
    first: i32,
    len: usize,
}

impl YearSpan {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Span from `start_year` to `end_year` inclusive, empty if `end_year < start_year`.
    pub fn new(start_year: i32, end_year: i32) -> Self {
        if end_year < start_year {
            return Self::empty();
        }
        Self {
            first: start_year,
            len: (end_year - start_year) as usize + 1,
        }
    }

    pub fn from_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        match (start, end) {
            (Some(start), Some(end)) => Self::new(start.year(), end.year()),
            _ => Self::empty(),
        }
    }

    /// Accepts `YYYY-MM-DD` or RFC 3339 timestamps. Unparseable dates count as absent.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Self {
        Self::from_dates(start.and_then(parse_date), end.and_then(parse_date))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        (0..self.len).map(move |offset| self.first + offset as i32)
    }

    pub fn index_of(&self, year: i32) -> Option<usize> {
        if self.is_empty() || year < self.first {
            return None;
        }
        let index = (year - self.first) as usize;
        (index < self.len).then_some(index)
    }

    pub fn year_at(&self, index: usize) -> Option<i32> {
        (index < self.len).then(|| self.first + index as i32)
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Which of the per-year arrays a value belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum YearField {
    Quantity,
    ProcessTime,
    Mng,
    Office,
    Hardware,
}

impl YearField {
    pub fn as_str(&self) -> &'static str {
        match self {
            YearField::Quantity => "quantity",
            YearField::ProcessTime => "process-time",
            YearField::Mng => "mng",
            YearField::Office => "office",
            YearField::Hardware => "hardware",
        }
    }

    /// Parse a raw textual value for this field.
    pub fn parse_value(&self, raw: &str) -> AssignmentResult<YearValue> {
        let raw = raw.trim();
        let invalid = |reason: String| AssignmentError::invalid_value(self.as_str(), reason);
        match self {
            YearField::Quantity => raw
                .parse::<u32>()
                .map(YearValue::Quantity)
                .map_err(|e| invalid(e.to_string())),
            YearField::ProcessTime => raw
                .parse::<f64>()
                .map(YearValue::ProcessTime)
                .map_err(|e| invalid(e.to_string())),
            YearField::Mng => raw
                .parse::<f64>()
                .map(YearValue::Mng)
                .map_err(|e| invalid(e.to_string())),
            YearField::Office => raw
                .parse::<bool>()
                .map(YearValue::Office)
                .map_err(|e| invalid(e.to_string())),
            YearField::Hardware => raw
                .parse::<bool>()
                .map(YearValue::Hardware)
                .map_err(|e| invalid(e.to_string())),
        }
    }
}

impl fmt::Display for YearField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for YearField {
    type Err = AssignmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quantity" | "quantities" => Ok(YearField::Quantity),
            "process-time" | "process_time" | "processtime" => Ok(YearField::ProcessTime),
            "mng" | "management" => Ok(YearField::Mng),
            "office" => Ok(YearField::Office),
            "hardware" => Ok(YearField::Hardware),
            other => Err(AssignmentError::invalid_value(
                "field",
                format!("unknown year field '{}'", other),
            )),
        }
    }
}

/// A single cell edit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum YearValue {
    Quantity(u32),
    ProcessTime(f64),
    Mng(f64),
    Office(bool),
    Hardware(bool),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyGrid {
    yearly_quantities: Vec<u32>,
    process_time_per_year: Vec<f64>,
    mng_per_year: Vec<f64>,
    office_per_year: Vec<bool>,
    hardware_per_year: Vec<bool>,
}

impl YearlyGrid {
    pub fn with_defaults(len: usize) -> Self {
        Self {
            yearly_quantities: vec![DEFAULT_QUANTITY; len],
            process_time_per_year: vec![DEFAULT_PROCESS_TIME; len],
            mng_per_year: vec![DEFAULT_MNG; len],
            office_per_year: vec![false; len],
            hardware_per_year: vec![false; len],
        }
    }

    pub fn len(&self) -> usize {
        self.yearly_quantities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn yearly_quantities(&self) -> &[u32] {
        &self.yearly_quantities
    }

    pub fn process_time_per_year(&self) -> &[f64] {
        &self.process_time_per_year
    }

    pub fn mng_per_year(&self) -> &[f64] {
        &self.mng_per_year
    }

    pub fn office_per_year(&self) -> &[bool] {
        &self.office_per_year
    }

    pub fn hardware_per_year(&self) -> &[bool] {
        &self.hardware_per_year
    }

    pub fn total_quantity(&self) -> AssignmentResult<u32> {
        self.yearly_quantities
            .iter()
            .try_fold(0u32, |total, quantity| total.checked_add(*quantity))
            .ok_or_else(|| {
                AssignmentError::invalid_value("quantity", "yearly quantities add up past the maximum")
            })
    }

    /// True when every array has exactly `len` entries.
    pub fn is_aligned(&self, len: usize) -> bool {
        self.yearly_quantities.len() == len
            && self.process_time_per_year.len() == len
            && self.mng_per_year.len() == len
            && self.office_per_year.len() == len
            && self.hardware_per_year.len() == len
    }

    /// Replace one cell. Other indices are untouched.
    pub fn set(&mut self, index: usize, value: YearValue) -> AssignmentResult<()> {
        let len = self.len();
        if index >= len {
            return Err(AssignmentError::YearOutOfRange { index, len });
        }

        match value {
            YearValue::Quantity(quantity) => self.yearly_quantities[index] = quantity,
            YearValue::ProcessTime(days) => {
                check_non_negative("process-time", days)?;
                self.process_time_per_year[index] = days;
            }
            YearValue::Mng(percentage) => {
                check_non_negative("mng", percentage)?;
                self.mng_per_year[index] = percentage;
            }
            YearValue::Office(flag) => self.office_per_year[index] = flag,
            YearValue::Hardware(flag) => self.hardware_per_year[index] = flag,
        }
        Ok(())
    }

    /// Move values from `from` years onto `to` years; years new to the span take defaults.
    pub fn realign(&self, from: &YearSpan, to: &YearSpan) -> Self {
        let mut grid = Self::with_defaults(to.len());
        for (index, year) in to.years().enumerate() {
            let Some(old) = from.index_of(year).filter(|old| *old < self.len()) else {
                continue;
            };
            grid.yearly_quantities[index] = self.yearly_quantities[old];
            grid.process_time_per_year[index] = self.process_time_per_year[old];
            grid.mng_per_year[index] = self.mng_per_year[old];
            grid.office_per_year[index] = self.office_per_year[old];
            grid.hardware_per_year[index] = self.hardware_per_year[old];
        }
        grid
    }
}

fn check_non_negative(field: &'static str, value: f64) -> AssignmentResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(AssignmentError::invalid_value(
            field,
            format!("{} must be a non-negative number", value),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_from_project_dates() {
        let span = YearSpan::parse(Some("2024-01-01"), Some("2026-12-31"));
        assert_eq!(span.years().collect::<Vec<_>>(), vec![2024, 2025, 2026]);
        assert_eq!(span.index_of(2025), Some(1));
        assert_eq!(span.index_of(2027), None);
        assert_eq!(span.year_at(2), Some(2026));
    }

    #[test]
    fn span_accepts_timestamps() {
        let span = YearSpan::parse(Some("2024-03-01T00:00:00Z"), Some("2025-06-30T12:00:00+02:00"));
        assert_eq!(span.len(), 2);
    }

    #[test]
    fn span_is_empty_without_dates_or_when_reversed() {
        assert!(YearSpan::parse(None, Some("2026-12-31")).is_empty());
        assert!(YearSpan::parse(Some("2026-01-01"), Some("2024-01-01")).is_empty());
        assert!(YearSpan::parse(Some("not a date"), Some("2024-01-01")).is_empty());
        assert_eq!(YearSpan::empty().index_of(2024), None);
    }

    #[test]
    fn defaults_per_year() {
        let grid = YearlyGrid::with_defaults(3);
        assert_eq!(grid.yearly_quantities(), &[1, 1, 1]);
        assert_eq!(grid.process_time_per_year(), &[0.0, 0.0, 0.0]);
        assert_eq!(grid.mng_per_year(), &[0.0, 0.0, 0.0]);
        assert_eq!(grid.office_per_year(), &[false, false, false]);
        assert!(grid.is_aligned(3));
    }

    #[test]
    fn set_replaces_single_index() {
        let mut grid = YearlyGrid::with_defaults(3);
        grid.set(1, YearValue::Quantity(5)).unwrap();
        grid.set(2, YearValue::Hardware(true)).unwrap();
        assert_eq!(grid.yearly_quantities(), &[1, 5, 1]);
        assert_eq!(grid.hardware_per_year(), &[false, false, true]);
        assert_eq!(grid.total_quantity().unwrap(), 7);
    }

    #[test]
    fn total_quantity_rejects_overflow() {
        let mut grid = YearlyGrid::with_defaults(2);
        grid.set(0, YearValue::Quantity(u32::MAX)).unwrap();
        assert!(matches!(
            grid.total_quantity(),
            Err(AssignmentError::InvalidValue { field: "quantity", .. })
        ));
    }

    #[test]
    fn set_rejects_out_of_range_and_negative() {
        let mut grid = YearlyGrid::with_defaults(2);
        assert!(matches!(
            grid.set(2, YearValue::Office(true)),
            Err(AssignmentError::YearOutOfRange { index: 2, len: 2 })
        ));
        assert!(grid.set(0, YearValue::Mng(-5.0)).is_err());
        assert!(grid.set(0, YearValue::ProcessTime(f64::NAN)).is_err());
        assert_eq!(grid, YearlyGrid::with_defaults(2));
    }

    #[test]
    fn realign_keeps_values_by_year() {
        let old_span = YearSpan::new(2024, 2026);
        let mut grid = YearlyGrid::with_defaults(3);
        grid.set(1, YearValue::Quantity(4)).unwrap();
        grid.set(2, YearValue::Quantity(6)).unwrap();

        let new_span = YearSpan::new(2025, 2027);
        let moved = grid.realign(&old_span, &new_span);
        assert_eq!(moved.yearly_quantities(), &[4, 6, 1]);
        assert!(moved.is_aligned(3));

        let shrunk = grid.realign(&old_span, &YearSpan::new(2024, 2024));
        assert_eq!(shrunk.yearly_quantities(), &[1]);
    }

    #[test]
    fn year_field_parsing() {
        assert_eq!("quantity".parse::<YearField>().unwrap(), YearField::Quantity);
        assert_eq!("process_time".parse::<YearField>().unwrap(), YearField::ProcessTime);
        assert!("overtime".parse::<YearField>().is_err());
        assert_eq!(
            YearField::Office.parse_value("true").unwrap(),
            YearValue::Office(true)
        );
        assert!(YearField::Quantity.parse_value("-1").is_err());
    }
}
