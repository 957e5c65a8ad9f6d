use crate::age::AgeParseMode;
use crate::credentials::CredentialProvider;
use crate::error::{Error, Result};
use crate::record::Record;
use std::fs;
use std::path::PathBuf;

/// Columns the pipeline cannot run without.
pub const REQUIRED_COLUMNS: [&str; 4] = ["Make", "TYPE OF DAMPER", "Age", "Test Result"];

/// Optional timestamp column used by date-range filtering.
pub const DATE_COLUMN: &str = "Test date time";

/// The single configurable data source.
///
/// Both variants produce the same labeled table; which one is active is
/// decided by configuration, not by parallel fetch modules.
#[derive(Debug, Clone)]
pub enum DataSource {
    /// A CSV file on local disk (also what the tests use).
    CsvFile { path: PathBuf },
    /// The CSV export endpoint of a remote sheet. The credential provider
    /// is resolved before every fetch so a fixed configuration problem
    /// heals on the next request.
    SheetExport {
        url: String,
        credentials: CredentialProvider,
    },
}

impl DataSource {
    /// Fetch the current dataset.
    ///
    /// On any failure the caller gets a descriptive error and no records;
    /// there is no partially fetched state to clean up.
    pub async fn fetch(&self, mode: AgeParseMode) -> Result<Vec<Record>> {
        let text = match self {
            DataSource::CsvFile { path } => fs::read_to_string(path)
                .map_err(|e| Error::Source(format!("cannot read {}: {}", path.display(), e)))?,
            DataSource::SheetExport { url, credentials } => {
                let key = credentials.resolve()?;
                log::info!("fetching sheet export as {}", key.client_email);
                let response = reqwest::get(url.as_str())
                    .await
                    .map_err(|e| Error::Source(format!("sheet fetch failed: {}", e)))?
                    .error_for_status()
                    .map_err(|e| Error::Source(format!("sheet fetch failed: {}", e)))?;
                response
                    .text()
                    .await
                    .map_err(|e| Error::Source(format!("sheet body unreadable: {}", e)))?
            }
        };
        let records = parse_table(&text, mode)?;
        log::info!("fetched {} records", records.len());
        Ok(records)
    }
}

/// Parse a CSV table into records.
///
/// The header row is matched against [`REQUIRED_COLUMNS`] after trimming;
/// missing columns fail the whole fetch rather than producing a table other
/// code would index blindly.
pub fn parse_table(csv: &str, mode: AgeParseMode) -> Result<Vec<Record>> {
    let mut lines = csv.lines().filter(|l| !l.trim().is_empty());
    let header_line = lines
        .next()
        .ok_or_else(|| Error::Source("fetched table is empty".to_string()))?;
    let headers: Vec<String> = parse_csv_row(header_line)
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingColumns(missing));
    }

    let col = |name: &str| headers.iter().position(|h| h == name);
    let make_idx = col("Make").expect("checked above");
    let type_idx = col("TYPE OF DAMPER").expect("checked above");
    let age_idx = col("Age").expect("checked above");
    let result_idx = col("Test Result").expect("checked above");
    let date_idx = col(DATE_COLUMN);

    let mut records = Vec::new();
    for line in lines {
        let fields = parse_csv_row(line);
        let get = |idx: usize| fields.get(idx).map(String::as_str).unwrap_or("");
        records.push(Record::from_raw(
            get(make_idx),
            get(type_idx),
            get(age_idx),
            get(result_idx),
            date_idx.map(get).unwrap_or(""),
            mode,
        )?);
    }
    Ok(records)
}

/// Split one CSV line into fields, honoring quoting and doubled quotes.
fn parse_csv_row(line: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if let Some(&next) = chars.peek() {
                    if next == '"' && in_quotes {
                        current_field.push('"');
                        chars.next();
                    } else {
                        in_quotes = !in_quotes;
                    }
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                result.push(current_field);
                current_field = String::new();
            }
            _ => current_field.push(c),
        }
    }
    result.push(current_field);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::age::AgeBucket;
    use std::io::Write;

    const SHEET: &str = "\
Make,TYPE OF DAMPER,Age,Test Result,Test date time
KONI,X,400 days,FAIL,2024-01-10 09:00:00
KONI,X,2000 days,PASS,2024-02-15 09:00:00
\"SACHS, GmbH\",Y,,FAIL,
";

    #[test]
    fn parses_quoted_fields_and_blank_ages() {
        let records = parse_table(SHEET, AgeParseMode::Lenient).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].make, "SACHS, GmbH");
        assert_eq!(records[2].bucket, AgeBucket::ThreeToFive);
        assert_eq!(records[0].age_days, Some(400));
        assert!(records[1].tested_at.is_some());
    }

    #[test]
    fn missing_columns_fail_the_fetch() {
        let err = parse_table("Make,Age\nKONI,400\n", AgeParseMode::Lenient).unwrap_err();
        match err {
            Error::MissingColumns(cols) => {
                assert_eq!(cols, vec!["TYPE OF DAMPER", "Test Result"]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn empty_table_is_a_source_error() {
        assert!(matches!(
            parse_table("", AgeParseMode::Lenient),
            Err(Error::Source(_))
        ));
    }

    #[test]
    fn strict_mode_surfaces_bad_ages() {
        let sheet = "Make,TYPE OF DAMPER,Age,Test Result\nKONI,X,junk,FAIL\n";
        assert!(matches!(
            parse_table(sheet, AgeParseMode::Strict),
            Err(Error::BadAge(_))
        ));
    }

    #[tokio::test]
    async fn csv_file_source_fetches() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SHEET.as_bytes()).unwrap();
        let source = DataSource::CsvFile {
            path: file.path().to_path_buf(),
        };
        let records = source.fetch(AgeParseMode::Lenient).await.unwrap();
        assert_eq!(records.len(), 3);

        let missing = DataSource::CsvFile {
            path: PathBuf::from("/nonexistent.csv"),
        };
        assert!(matches!(
            missing.fetch(AgeParseMode::Lenient).await,
            Err(Error::Source(_))
        ));
    }
}
