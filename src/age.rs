use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal age classification for a damper, derived from days since
/// manufacture.
///
/// Every record maps to exactly one bucket. The bucket boundaries are:
///
/// | bucket              | days        |
/// |---------------------|-------------|
/// | `Less than 2 years` | 0–729       |
/// | `2-3 years`         | 730–1094    |
/// | `3-5 years`         | 1095–1824   |
/// | `Above 5 years`     | 1825 and up |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgeBucket {
    LessThan2,
    TwoToThree,
    ThreeToFive,
    Above5,
}

/// All buckets in ordinal order, used for fixed column ordering in pivots
/// and dropdowns.
pub const BUCKET_ORDER: [AgeBucket; 4] = [
    AgeBucket::LessThan2,
    AgeBucket::TwoToThree,
    AgeBucket::ThreeToFive,
    AgeBucket::Above5,
];

impl AgeBucket {
    /// Display label, also the value used in filters and report columns.
    pub fn label(&self) -> &'static str {
        match self {
            AgeBucket::LessThan2 => "Less than 2 years",
            AgeBucket::TwoToThree => "2-3 years",
            AgeBucket::ThreeToFive => "3-5 years",
            AgeBucket::Above5 => "Above 5 years",
        }
    }

    /// Parse a bucket from its display label, case-insensitively.
    pub fn from_label(label: &str) -> Option<AgeBucket> {
        let trimmed = label.trim();
        BUCKET_ORDER
            .into_iter()
            .find(|b| b.label().eq_ignore_ascii_case(trimmed))
    }

    /// All labels in ordinal order.
    pub fn labels() -> Vec<String> {
        BUCKET_ORDER.iter().map(|b| b.label().to_string()).collect()
    }
}

impl fmt::Display for AgeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How unparseable raw age values are handled during ingest.
///
/// The upstream data occasionally carries blank or junk ages. Lenient mode
/// folds those into the middle bucket, which smooths the data but can hide
/// bad records; strict mode surfaces them as errors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgeParseMode {
    #[default]
    Lenient,
    Strict,
}

lazy_static! {
    static ref DAYS_SUFFIX: Regex = Regex::new(r"(?i)\s*days?\s*$").expect("valid regex");
}

/// Parse a raw age field into days.
///
/// Accepts an integer, a numeric string, or a string of the form `"N days"`.
/// Returns `None` for empty, missing or non-numeric input.
pub fn parse_age(raw: &str) -> Option<i64> {
    let stripped = DAYS_SUFFIX.replace(raw, "");
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Ages sometimes arrive as floats ("400.0"); accept those too.
    if let Ok(days) = trimmed.parse::<i64>() {
        return Some(days);
    }
    match trimmed.parse::<f64>() {
        // f64 parsing accepts "nan"/"inf"; those are junk, not ages.
        Ok(days) if days.is_finite() => Some(days as i64),
        _ => None,
    }
}

/// Bucket an age in days by the ranges above.
pub fn classify_days(days: i64) -> AgeBucket {
    if days < 730 {
        AgeBucket::LessThan2
    } else if days < 1095 {
        AgeBucket::TwoToThree
    } else if days < 1825 {
        AgeBucket::ThreeToFive
    } else {
        AgeBucket::Above5
    }
}

/// Classify a raw age field into a bucket.
///
/// In lenient mode this is a total function: unparseable input falls into
/// the `3-5 years` bucket and is logged, never an error. In strict mode an
/// unparseable value is rejected with [`Error::BadAge`].
pub fn bucket_for(raw: &str, mode: AgeParseMode) -> Result<AgeBucket> {
    match parse_age(raw) {
        Some(days) => Ok(classify_days(days)),
        None => match mode {
            AgeParseMode::Lenient => {
                if !raw.trim().is_empty() {
                    log::debug!("unparseable age {:?}, defaulting to 3-5 years", raw);
                }
                Ok(AgeBucket::ThreeToFive)
            }
            AgeParseMode::Strict => Err(Error::BadAge(raw.to_string())),
        },
    }
}
