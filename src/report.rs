use crate::error::{Error, Result};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::fs;
use std::path::{Path, PathBuf};

/// A finished report table, ready for rendering.
///
/// The HTML and XLSX renderings are built independently from this one
/// immutable value; neither borrows state from the other.
#[derive(Debug, Clone)]
pub struct Report {
    /// Heading shown above the table and merged across the XLSX header.
    /// Stored raw; each rendering escapes it as that format requires.
    pub heading: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Escape text for safe embedding in an HTML table cell.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl Report {
    /// Render the report as a bordered/striped HTML fragment.
    ///
    /// The heading, headers and every cell are escaped.
    pub fn html(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "<h4><strong>{}</strong></h4>\n<table class=\"table table-bordered table-striped\">\n<thead><tr>",
            escape_html(&self.heading)
        ));
        for header in &self.headers {
            out.push_str(&format!("<th>{}</th>", escape_html(header)));
        }
        out.push_str("</tr></thead>\n<tbody>\n");
        for row in &self.rows {
            out.push_str("<tr>");
            for cell in row {
                out.push_str(&format!("<td>{}</td>", escape_html(cell)));
            }
            out.push_str("</tr>\n");
        }
        out.push_str("</tbody>\n</table>\n");
        out
    }

    /// Render the report as XLSX bytes.
    ///
    /// Layout: the heading merged bold across the full header width on the
    /// first row, a bold header row beneath it, then the data rows. Column
    /// widths are sized to the longest cell in each column with the header
    /// width as the minimum.
    pub fn xlsx(&self) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let mut worksheet = Worksheet::new();

        let heading_format = Format::new().set_bold().set_font_size(14.0);
        let header_format = Format::new().set_bold();

        let last_col = (self.headers.len().saturating_sub(1)) as u16;
        if last_col > 0 {
            worksheet.merge_range(0, 0, 0, last_col, self.heading.as_str(), &heading_format)?;
        } else {
            worksheet.write_string_with_format(0, 0, self.heading.as_str(), &heading_format)?;
        }

        for (c, header) in self.headers.iter().enumerate() {
            worksheet.write_string_with_format(1, c as u16, header.as_str(), &header_format)?;
        }
        for (r, row) in self.rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                // Numeric cells stay numeric in the sheet.
                if let Ok(n) = cell.parse::<f64>() {
                    worksheet.write_number((r + 2) as u32, c as u16, n)?;
                } else {
                    worksheet.write_string((r + 2) as u32, c as u16, cell.as_str())?;
                }
            }
        }

        for (c, header) in self.headers.iter().enumerate() {
            let widest = self
                .rows
                .iter()
                .filter_map(|row| row.get(c))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
                .max(header.chars().count());
            worksheet.set_column_width(c as u16, (widest + 2) as f64)?;
        }

        workbook.push_worksheet(worksheet);
        Ok(workbook.save_to_buffer()?)
    }
}

/// Derive a deterministic, filesystem- and URL-safe report filename.
///
/// Spaces become underscores, `<`/`>` become words, anything else
/// non-alphanumeric becomes an underscore:
/// `safe_filename("Age_Analysis", "Less than 2 years")` is
/// `"Age_Analysis_Less_than_2_years.xlsx"`.
pub fn safe_filename(prefix: &str, value: &str) -> String {
    let mut safe = String::with_capacity(value.len());
    for c in value.trim().chars() {
        match c {
            '<' => safe.push_str("less_than"),
            '>' => safe.push_str("greater_than"),
            c if c.is_alphanumeric() => safe.push(c),
            _ => safe.push('_'),
        }
    }
    format!("{}_{}.xlsx", prefix, safe)
}

/// The shared reports directory.
///
/// Filenames are derived deterministically per filter value, so two requests
/// for the same value target the same file; last writer wins by design.
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    /// Open (and create if needed) the reports directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<ReportStore> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(ReportStore {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    /// Write report bytes under the given name, returning the full path.
    pub fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        check_filename(filename)?;
        let path = self.dir.join(filename);
        fs::write(&path, bytes)?;
        log::info!("wrote report {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// Read a previously written report back for download.
    pub fn load(&self, filename: &str) -> Result<Vec<u8>> {
        check_filename(filename)?;
        let path = self.dir.join(filename);
        fs::read(&path).map_err(|_| Error::ReportNotFound(filename.to_string()))
    }
}

/// Reject names that could escape the reports directory.
fn check_filename(filename: &str) -> Result<()> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return Err(Error::ReportNotFound(filename.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Report {
        Report {
            heading: "Failure Analysis for Make: KONI".to_string(),
            headers: vec!["TYPE OF DAMPER".into(), "Failures".into(), "Failure %".into()],
            rows: vec![
                vec!["X".into(), "1".into(), "50.00".into()],
                vec!["<script>".into(), "0".into(), "0.00".into()],
            ],
        }
    }

    #[test]
    fn html_escapes_cells() {
        let html = sample().html();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("table-bordered"));
        assert!(html.contains("<th>Failures</th>"));
    }

    #[test]
    fn heading_is_escaped_per_rendering() {
        let mut report = sample();
        report.heading = "Failure Analysis for Make: A&B".to_string();
        let html = report.html();
        assert!(html.contains("Make: A&amp;B"));
        assert!(!html.contains("Make: A&B"));
        // The stored heading stays raw so the XLSX gets the literal text.
        assert_eq!(report.heading, "Failure Analysis for Make: A&B");
        assert!(report.xlsx().is_ok());
    }

    #[test]
    fn xlsx_is_nonempty_and_standalone() {
        let report = sample();
        let bytes = report.xlsx().unwrap();
        // XLSX is a zip container; check the magic.
        assert!(bytes.len() > 4);
        assert_eq!(&bytes[0..2], b"PK");
        // Rendering twice must give the same bytes back-to-back; the two
        // renderings share no mutable state.
        assert_eq!(report.html(), report.html());
    }

    #[test]
    fn filename_derivation_is_pinned() {
        assert_eq!(
            safe_filename("Age_Analysis", "Less than 2 years"),
            "Age_Analysis_Less_than_2_years.xlsx"
        );
        assert_eq!(
            safe_filename("Age_Analysis", "<2y"),
            "Age_Analysis_less_than2y.xlsx"
        );
        assert_eq!(
            safe_filename("Make_Analysis", "KONI/EU"),
            "Make_Analysis_KONI_EU.xlsx"
        );
        // Deterministic.
        assert_eq!(
            safe_filename("Type_Analysis", "A B"),
            safe_filename("Type_Analysis", "A B")
        );
    }

    #[test]
    fn store_round_trip_and_traversal_check() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::open(dir.path()).unwrap();
        store.save("a.xlsx", b"PK-data").unwrap();
        assert_eq!(store.load("a.xlsx").unwrap(), b"PK-data");
        assert!(store.load("missing.xlsx").is_err());
        assert!(store.load("../etc/passwd").is_err());
        assert!(store.save("sub/dir.xlsx", b"x").is_err());
    }
}
