use crate::age::AgeBucket;
use crate::filter::Dimension;
use crate::record::Record;
use crate::tabulate::{self, failure_pct};
use std::collections::BTreeMap;

/// Failure counts for one pivot cell.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CellStats {
    pub failures: u32,
    pub total: u32,
    pub pct: f64,
}

impl CellStats {
    fn from_counts(failures: u32, total: u32) -> CellStats {
        CellStats {
            failures,
            total,
            pct: failure_pct(failures, total),
        }
    }
}

/// A denormalized two-dimensional pivot of failure statistics.
///
/// The structure stays nested (row value → column value → stats) until the
/// rendering boundary; [`PivotTable::flatten`] is the only place that turns
/// it into flat columns for HTML/XLSX output.
#[derive(Debug, Clone)]
pub struct PivotTable {
    pub row_dim: Dimension,
    pub col_dim: Dimension,
    /// Distinct column values in display order.
    pub columns: Vec<String>,
    /// Per row value: stats per column value (missing cells mean no records).
    pub cells: BTreeMap<String, BTreeMap<String, CellStats>>,
    /// Per-row totals across all columns.
    pub row_totals: BTreeMap<String, CellStats>,
    /// Per-column totals across all rows.
    pub col_totals: BTreeMap<String, CellStats>,
    pub grand_total: CellStats,
    /// Label of the appended all-rows totals line, e.g. `Total (All Types)`.
    pub totals_label: String,
}

impl PivotTable {
    /// Build the pivot from raw filtered records.
    ///
    /// All totals are recomputed from counts over the same records (never
    /// from cell percentages), which keeps them exact and idempotent with a
    /// direct ungrouped aggregate.
    pub fn build(
        records: &[Record],
        row_dim: Dimension,
        col_dim: Dimension,
        totals_label: &str,
    ) -> PivotTable {
        let xt = tabulate::cross_tab(records, row_dim, col_dim);

        let columns = match col_dim {
            // Age buckets keep their ordinal order rather than lexical.
            Dimension::AgeBucket => AgeBucket::labels(),
            _ => xt.cols_margin.iter().map(|r| r.label().to_string()).collect(),
        };

        let mut cells: BTreeMap<String, BTreeMap<String, CellStats>> = BTreeMap::new();
        for cell in &xt.cells {
            cells
                .entry(cell.keys[0].clone())
                .or_default()
                .insert(cell.keys[1].clone(), CellStats::from_counts(cell.failures, cell.total));
        }

        let row_totals = xt
            .rows_margin
            .iter()
            .map(|r| (r.label().to_string(), CellStats::from_counts(r.failures, r.total)))
            .collect();
        let col_totals = xt
            .cols_margin
            .iter()
            .map(|r| (r.label().to_string(), CellStats::from_counts(r.failures, r.total)))
            .collect();

        let failures: u32 = xt.rows_margin.iter().map(|r| r.failures).sum();
        let total: u32 = xt.rows_margin.iter().map(|r| r.total).sum();

        PivotTable {
            row_dim,
            col_dim,
            columns,
            cells,
            row_totals,
            col_totals,
            grand_total: CellStats::from_counts(failures, total),
            totals_label: totals_label.to_string(),
        }
    }

    /// Flatten to a header row and data rows for rendering.
    ///
    /// Each column value expands to three flat columns (`<v> Fail`,
    /// `<v> Total`, `<v> %`), followed by the per-row totals triple and a
    /// final totals line across all rows.
    pub fn flatten(&self) -> (Vec<String>, Vec<Vec<String>>) {
        let mut headers = vec![self.row_dim.heading().to_string()];
        for col in &self.columns {
            headers.push(format!("{} Fail", col));
            headers.push(format!("{} Total", col));
            headers.push(format!("{} %", col));
        }
        headers.push("Total Fail".to_string());
        headers.push("Total Received".to_string());
        headers.push("Total %".to_string());

        let empty = CellStats::default();
        let mut body = Vec::with_capacity(self.cells.len() + 1);
        for (row_value, row_cells) in &self.cells {
            let mut out = vec![row_value.clone()];
            for col in &self.columns {
                let stats = row_cells.get(col).unwrap_or(&empty);
                push_stats(&mut out, stats);
            }
            let row_total = self.row_totals.get(row_value).unwrap_or(&empty);
            push_stats(&mut out, row_total);
            body.push(out);
        }

        let mut totals = vec![self.totals_label.clone()];
        for col in &self.columns {
            let stats = self.col_totals.get(col).unwrap_or(&empty);
            push_stats(&mut totals, stats);
        }
        push_stats(&mut totals, &self.grand_total);
        body.push(totals);

        (headers, body)
    }
}

fn push_stats(out: &mut Vec<String>, stats: &CellStats) {
    out.push(stats.failures.to_string());
    out.push(stats.total.to_string());
    out.push(format!("{:.2}", stats.pct));
}
