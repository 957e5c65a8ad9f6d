use crate::tabulate::{AggregateRow, round2};
use serde::{Deserialize, Serialize};

/// One entry of a Pareto ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoRow {
    pub label: String,
    pub failures: u32,
    /// This row's share of total failures (not of total receipts).
    pub contribution_pct: f64,
    /// Running contribution, rounded at each step; exactly `100.0` on the
    /// final synthetic TOTAL row.
    pub cumulative_pct: f64,
}

/// Rank aggregates by contribution to total failures.
///
/// Rows are sorted descending by contribution with ties broken by label
/// ascending, the cumulative share is accumulated unrounded and rounded per
/// row, and a synthetic `TOTAL` row is appended with both percentages pinned
/// to exactly `100.0` so rounding of the intermediate rows can never make
/// the total drift.
pub fn rank(rows: &[AggregateRow]) -> Vec<ParetoRow> {
    let total_failures: u32 = rows.iter().map(|r| r.failures).sum();

    let mut ordered: Vec<&AggregateRow> = rows.iter().collect();
    ordered.sort_by(|a, b| {
        b.failures
            .cmp(&a.failures)
            .then_with(|| a.label().cmp(b.label()))
    });

    let mut running = 0.0_f64;
    let mut ranked: Vec<ParetoRow> = ordered
        .into_iter()
        .map(|row| {
            let share = if total_failures == 0 {
                0.0
            } else {
                row.failures as f64 / total_failures as f64 * 100.0
            };
            running += share;
            ParetoRow {
                label: row.label().to_string(),
                failures: row.failures,
                contribution_pct: round2(share),
                cumulative_pct: round2(running),
            }
        })
        .collect();

    ranked.push(ParetoRow {
        label: "TOTAL".to_string(),
        failures: total_failures,
        contribution_pct: 100.0,
        cumulative_pct: 100.0,
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(label: &str, failures: u32, total: u32) -> AggregateRow {
        AggregateRow {
            keys: vec![label.to_string()],
            failures,
            total,
            failure_pct: crate::tabulate::failure_pct(failures, total),
        }
    }

    #[test]
    fn sorts_descending_with_label_tiebreak() {
        let ranked = rank(&[row("B", 2, 10), row("C", 5, 10), row("A", 2, 10)]);
        let labels: Vec<_> = ranked.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["C", "A", "B", "TOTAL"]);
    }

    #[test]
    fn final_row_is_exactly_100() {
        // Three equal thirds round to 33.33 each; the TOTAL row must still
        // be exactly 100.0, not 99.99.
        let ranked = rank(&[row("A", 1, 3), row("B", 1, 3), row("C", 1, 3)]);
        assert_eq!(ranked[0].contribution_pct, 33.33);
        assert_eq!(ranked[2].cumulative_pct, 100.0);
        let total = ranked.last().unwrap();
        assert_eq!(total.label, "TOTAL");
        assert_eq!(total.contribution_pct, 100.0);
        assert_eq!(total.cumulative_pct, 100.0);
    }

    #[test]
    fn cumulative_is_monotonic() {
        let ranked = rank(&[row("A", 7, 10), row("B", 2, 10), row("C", 1, 10)]);
        let cums: Vec<_> = ranked.iter().map(|r| r.cumulative_pct).collect();
        assert!(cums.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(cums, vec![70.0, 90.0, 100.0, 100.0]);
    }

    #[test]
    fn zero_failures_contributes_zero_not_nan() {
        let ranked = rank(&[row("A", 0, 5), row("B", 0, 3)]);
        assert!(ranked.iter().all(|r| r.contribution_pct.is_finite()));
        assert_eq!(ranked[0].contribution_pct, 0.0);
        assert_eq!(ranked.last().unwrap().cumulative_pct, 100.0);
    }
}
