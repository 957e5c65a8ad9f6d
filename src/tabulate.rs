use crate::filter::Dimension;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Round to two decimals, half away from zero.
///
/// This is the single rounding rule for every percentage in the crate;
/// charts, tables and exports must all agree on it.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Failures over total as a percentage, rounded; `0.0` when the total is 0.
pub fn failure_pct(failures: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(failures as f64 / total as f64 * 100.0)
    }
}

/// One group of a cross-tabulation.
///
/// `keys` holds the group's value along each requested dimension, in the
/// order the dimensions were requested. Invariant: `failures <= total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub keys: Vec<String>,
    pub failures: u32,
    pub total: u32,
    pub failure_pct: f64,
}

impl AggregateRow {
    fn from_counts(keys: Vec<String>, failures: u32, total: u32) -> AggregateRow {
        AggregateRow {
            keys,
            failures,
            total,
            failure_pct: failure_pct(failures, total),
        }
    }

    /// The group label for single-dimension rows.
    pub fn label(&self) -> &str {
        self.keys.first().map(String::as_str).unwrap_or("")
    }
}

/// Group records by the given dimensions, counting failures and receipts.
///
/// Output is sorted ascending by key(s) so equal inputs always produce
/// identical tables regardless of record order.
pub fn aggregate(records: &[Record], dims: &[Dimension]) -> Vec<AggregateRow> {
    let mut groups: BTreeMap<Vec<String>, (u32, u32)> = BTreeMap::new();
    for record in records {
        let keys: Vec<String> = dims.iter().map(|d| d.value_of(record)).collect();
        let entry = groups.entry(keys).or_insert((0, 0));
        if record.result.is_fail() {
            entry.0 += 1;
        }
        entry.1 += 1;
    }
    groups
        .into_iter()
        .map(|(keys, (failures, total))| AggregateRow::from_counts(keys, failures, total))
        .collect()
}

/// A two-dimensional cross-tabulation plus both marginal summaries.
///
/// Chart callers need the matrix (per-cell rows) and the margins (one
/// aggregate per distinct value of each dimension) together.
#[derive(Debug, Clone)]
pub struct CrossTab {
    pub cells: Vec<AggregateRow>,
    pub rows_margin: Vec<AggregateRow>,
    pub cols_margin: Vec<AggregateRow>,
}

impl CrossTab {
    /// The cell for a given (row value, column value) pair, if any records
    /// fell in it.
    pub fn cell(&self, row: &str, col: &str) -> Option<&AggregateRow> {
        self.cells
            .iter()
            .find(|c| c.keys[0] == row && c.keys[1] == col)
    }
}

/// Cross-tabulate records by two dimensions, computing the matrix and both
/// single-dimension margins in one pass over the data.
pub fn cross_tab(records: &[Record], rows: Dimension, cols: Dimension) -> CrossTab {
    CrossTab {
        cells: aggregate(records, &[rows, cols]),
        rows_margin: aggregate(records, &[rows]),
        cols_margin: aggregate(records, &[cols]),
    }
}

/// Append the synthetic `Total` row.
///
/// The total is recomputed from the summed counts, never from the rows'
/// percentages (percentages do not sum). The label lands in the first key
/// column; any further key columns are left blank.
pub fn with_totals(mut rows: Vec<AggregateRow>) -> Vec<AggregateRow> {
    let failures: u32 = rows.iter().map(|r| r.failures).sum();
    let total: u32 = rows.iter().map(|r| r.total).sum();
    let key_width = rows.first().map(|r| r.keys.len()).unwrap_or(1);
    let mut keys = vec!["Total".to_string()];
    keys.resize(key_width.max(1), String::new());
    rows.push(AggregateRow::from_counts(keys, failures, total));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::age::AgeParseMode;
    use crate::record::Record;

    fn rec(make: &str, dtype: &str, age: &str, result: &str) -> Record {
        Record::from_raw(make, dtype, age, result, "", AgeParseMode::Lenient).unwrap()
    }

    fn sample() -> Vec<Record> {
        vec![
            rec("KONI", "X", "400 days", "FAIL"),
            rec("KONI", "X", "2000 days", "PASS"),
            rec("SACHS", "X", "800", "FAIL"),
            rec("SACHS", "Y", "800", "PASS"),
            rec("SACHS", "Y", "10", "FAIL"),
        ]
    }

    #[test]
    fn rounding_is_half_up_two_decimals() {
        assert_eq!(round2(1.0 / 3.0 * 100.0), 33.33);
        assert_eq!(round2(2.0 / 3.0 * 100.0), 66.67);
        assert_eq!(round2(12.3456), 12.35);
        assert_eq!(failure_pct(0, 0), 0.0);
        assert_eq!(failure_pct(1, 2), 50.0);
    }

    #[test]
    fn single_dimension_aggregate_counts_failures_per_make() {
        let records = vec![
            rec("KONI", "X", "400 days", "FAIL"),
            rec("KONI", "X", "2000 days", "PASS"),
        ];
        let rows = aggregate(&records, &[Dimension::Make]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].keys, vec!["KONI"]);
        assert_eq!(rows[0].failures, 1);
        assert_eq!(rows[0].total, 2);
        assert_eq!(rows[0].failure_pct, 50.0);
    }

    #[test]
    fn failures_are_conserved_across_grouping() {
        let records = sample();
        let raw_failures = records.iter().filter(|r| r.result.is_fail()).count() as u32;
        for dims in [
            vec![Dimension::Make],
            vec![Dimension::DamperType],
            vec![Dimension::Make, Dimension::AgeBucket],
        ] {
            let grouped: u32 = aggregate(&records, &dims).iter().map(|r| r.failures).sum();
            assert_eq!(grouped, raw_failures, "dims = {:?}", dims);
        }
    }

    #[test]
    fn output_is_sorted_by_keys() {
        let rows = aggregate(&sample(), &[Dimension::Make, Dimension::DamperType]);
        let keys: Vec<_> = rows.iter().map(|r| r.keys.clone()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn totals_row_equals_ungrouped_aggregate() {
        let records = sample();
        let with = with_totals(aggregate(&records, &[Dimension::Make]));
        let total_row = with.last().unwrap();
        assert_eq!(total_row.label(), "Total");

        // A direct aggregate with no grouping dimension must agree exactly.
        let direct = aggregate(&records, &[]);
        assert_eq!(direct.len(), 1);
        assert_eq!(total_row.failures, direct[0].failures);
        assert_eq!(total_row.total, direct[0].total);
        assert_eq!(total_row.failure_pct, direct[0].failure_pct);
    }

    #[test]
    fn cross_tab_margins_agree_with_matrix() {
        let xt = cross_tab(&sample(), Dimension::Make, Dimension::DamperType);
        let matrix_total: u32 = xt.cells.iter().map(|c| c.total).sum();
        let rows_total: u32 = xt.rows_margin.iter().map(|c| c.total).sum();
        let cols_total: u32 = xt.cols_margin.iter().map(|c| c.total).sum();
        assert_eq!(matrix_total, 5);
        assert_eq!(rows_total, 5);
        assert_eq!(cols_total, 5);
        assert_eq!(xt.cell("SACHS", "Y").unwrap().failures, 1);
        assert!(xt.cell("KONI", "Y").is_none());
    }

    #[test]
    fn invariant_failures_le_total() {
        for row in with_totals(aggregate(&sample(), &[Dimension::AgeBucket])) {
            assert!(row.failures <= row.total);
        }
    }
}
