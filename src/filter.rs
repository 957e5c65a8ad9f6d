use crate::error::{Error, Result};
use crate::record::Record;
use chrono::{NaiveDate, NaiveDateTime};

/// A grouping/filtering dimension of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Make,
    DamperType,
    AgeBucket,
}

impl Dimension {
    /// Column heading used in rendered tables.
    pub fn heading(&self) -> &'static str {
        match self {
            Dimension::Make => "Make",
            Dimension::DamperType => "TYPE OF DAMPER",
            Dimension::AgeBucket => "Age Group",
        }
    }

    /// The record's value along this dimension.
    pub fn value_of(&self, record: &Record) -> String {
        match self {
            Dimension::Make => record.make.clone(),
            Dimension::DamperType => record.damper_type.clone(),
            Dimension::AgeBucket => record.bucket.label().to_string(),
        }
    }
}

/// What the user picked for one dimension's dropdown.
///
/// `ALL` keeps every value, `NONE` drops the dimension from both filtering
/// and grouping, anything else filters to that value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    Excluded,
    Value(String),
}

impl Selection {
    /// Interpret a raw form value, honoring the `ALL`/`NONE` sentinels.
    pub fn parse(raw: &str) -> Selection {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("ALL") {
            Selection::All
        } else if trimmed.eq_ignore_ascii_case("NONE") {
            Selection::Excluded
        } else {
            Selection::Value(trimmed.to_string())
        }
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            Selection::All | Selection::Excluded => true,
            Selection::Value(wanted) => value.trim().eq_ignore_ascii_case(wanted.trim()),
        }
    }
}

/// An inclusive test-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    /// Build a range from ISO `YYYY-MM-DD` strings, rejecting malformed
    /// input and inverted ranges.
    pub fn parse(start: &str, end: &str) -> Result<DateRange> {
        let start_day = NaiveDate::parse_from_str(start.trim(), "%Y-%m-%d")
            .map_err(|e| Error::BadDateRange(format!("bad start date {:?}: {}", start, e)))?;
        let end_day = NaiveDate::parse_from_str(end.trim(), "%Y-%m-%d")
            .map_err(|e| Error::BadDateRange(format!("bad end date {:?}: {}", end, e)))?;
        if start_day > end_day {
            return Err(Error::BadDateRange(format!(
                "start {} is after end {}",
                start_day, end_day
            )));
        }
        Ok(DateRange {
            start: start_day.and_hms_opt(0, 0, 0).expect("midnight is valid"),
            // End bound is inclusive of the whole end day.
            end: end_day.and_hms_opt(23, 59, 59).expect("valid time"),
        })
    }

    fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.start && at <= self.end
    }
}

/// Explicit filter state for one request.
///
/// The HTTP layer builds this from the session and query string; the core
/// never reads ambient state.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub period: Option<DateRange>,
    pub make: Selection,
    pub damper_type: Selection,
    pub age_group: Selection,
}

impl FilterCriteria {
    pub fn with_period(mut self, period: Option<DateRange>) -> Self {
        self.period = period;
        self
    }

    fn selection(&self, dim: Dimension) -> &Selection {
        match dim {
            Dimension::Make => &self.make,
            Dimension::DamperType => &self.damper_type,
            Dimension::AgeBucket => &self.age_group,
        }
    }

    /// The dimensions that remain available for grouping (everything not
    /// explicitly excluded via `NONE`).
    pub fn grouping_dimensions(&self) -> Vec<Dimension> {
        [Dimension::Make, Dimension::DamperType, Dimension::AgeBucket]
            .into_iter()
            .filter(|d| *self.selection(*d) != Selection::Excluded)
            .collect()
    }

    /// Apply the date and dimension filters, returning a new filtered set.
    ///
    /// The two filters compose with AND. When a period is set, records with
    /// no parseable timestamp are excluded. The input is never mutated.
    pub fn apply(&self, records: &[Record]) -> Vec<Record> {
        records
            .iter()
            .filter(|r| match self.period {
                Some(range) => r.tested_at.map(|at| range.contains(at)).unwrap_or(false),
                None => true,
            })
            .filter(|r| self.make.matches(&r.make))
            .filter(|r| self.damper_type.matches(&r.damper_type))
            .filter(|r| self.age_group.matches(r.bucket.label()))
            .cloned()
            .collect()
    }
}
