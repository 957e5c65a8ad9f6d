use crate::age::{self, AgeBucket, AgeParseMode};
use crate::error::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Outcome of a single damper test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestResult {
    Pass,
    Fail,
    /// Anything that is neither PASS nor FAIL (retest markers, blanks).
    Other(String),
}

impl TestResult {
    pub fn parse(raw: &str) -> TestResult {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("PASS") {
            TestResult::Pass
        } else if trimmed.eq_ignore_ascii_case("FAIL") {
            TestResult::Fail
        } else {
            TestResult::Other(trimmed.to_string())
        }
    }

    /// Whether this result counts towards the failure numerator.
    ///
    /// Only an explicit FAIL counts; blanks and retest markers contribute to
    /// receipts but not to failures.
    pub fn is_fail(&self) -> bool {
        matches!(self, TestResult::Fail)
    }
}

/// One inspection/test event pulled from the sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub make: String,
    pub damper_type: String,
    /// Parsed days since manufacture, `None` when the raw field was blank
    /// or junk (the bucket still gets the lenient default).
    pub age_days: Option<i64>,
    pub bucket: AgeBucket,
    pub result: TestResult,
    /// Test timestamp; `None` when missing or unparseable, which excludes
    /// the record from any date-range filter.
    pub tested_at: Option<NaiveDateTime>,
}

/// Timestamp layouts seen in the sheet; tried in order.
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Parse a raw `Test date time` cell. Unparseable input becomes `None`
/// rather than an error so one bad timestamp cannot fail an entire fetch.
pub fn parse_test_time(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    // A bare date is valid too; treat it as midnight.
    chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is valid"))
}

impl Record {
    /// Build a record from the raw sheet fields.
    ///
    /// Blank make / damper type fold into `"Unknown"` so they still group.
    /// Age handling follows `mode`; in strict mode a junk age fails the
    /// whole ingest.
    pub fn from_raw(
        make: &str,
        damper_type: &str,
        age: &str,
        result: &str,
        tested_at: &str,
        mode: AgeParseMode,
    ) -> Result<Record> {
        let bucket = age::bucket_for(age, mode)?;
        Ok(Record {
            make: non_blank(make),
            damper_type: non_blank(damper_type),
            age_days: age::parse_age(age),
            bucket,
            result: TestResult::parse(result),
            tested_at: parse_test_time(tested_at),
        })
    }
}

fn non_blank(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        "Unknown".to_string()
    } else {
        trimmed.to_string()
    }
}
