use crate::filter::Dimension;
use crate::pareto;
use crate::pivot::PivotTable;
use crate::record::Record;
use crate::tabulate;
use serde::Serialize;

/// Chart.js color palette, reused cyclically across datasets and slices.
pub const PALETTE: [&str; 8] = [
    "rgba(255, 99, 132, 0.7)",
    "rgba(54, 162, 235, 0.7)",
    "rgba(255, 206, 86, 0.7)",
    "rgba(75, 192, 192, 0.7)",
    "rgba(153, 102, 255, 0.7)",
    "rgba(255, 159, 64, 0.7)",
    "rgba(199, 199, 199, 0.7)",
    "rgba(83, 102, 255, 0.7)",
];

/// One grouped-bar dataset: a secondary-dimension value's failure % across
/// the primary labels.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub label: String,
    #[serde(rename = "backgroundColor")]
    pub background_color: String,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PieChart {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    #[serde(rename = "backgroundColor")]
    pub background_color: Vec<String>,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParetoChart {
    pub labels: Vec<String>,
    /// Absolute failure counts per category.
    pub values: Vec<u32>,
    /// Cumulative contribution % per category.
    pub cumulative: Vec<f64>,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// The JSON contract consumed by the client-side charts.
///
/// Field names are part of the interface and must not change: `labels`,
/// `values`, `datasets`, `pieChart`, `paretoChart`, `tableData`.
#[derive(Debug, Clone, Serialize)]
pub struct ChartPayload {
    pub title: String,
    /// Primary-dimension labels for the main bar chart.
    pub labels: Vec<String>,
    /// Failure % per primary label.
    pub values: Vec<f64>,
    /// Grouped bars: one dataset per secondary-dimension value.
    pub datasets: Vec<Dataset>,
    #[serde(rename = "pieChart")]
    pub pie_chart: PieChart,
    #[serde(rename = "paretoChart")]
    pub pareto_chart: ParetoChart,
    #[serde(rename = "tableData")]
    pub table_data: TableData,
}

/// Build the full chart payload for one analysis view.
///
/// `primary` drives the main bar chart and the x axis of the grouped bars;
/// `secondary` drives the grouped datasets, the pie slices and the Pareto
/// ranking. `subject` names the filtered entity for the chart titles, e.g.
/// `"Make: KONI"`.
pub fn build_payload(
    records: &[Record],
    primary: Dimension,
    secondary: Dimension,
    subject: &str,
) -> ChartPayload {
    let xt = tabulate::cross_tab(records, primary, secondary);

    let labels: Vec<String> = xt.rows_margin.iter().map(|r| r.label().to_string()).collect();
    let values: Vec<f64> = xt.rows_margin.iter().map(|r| r.failure_pct).collect();

    let datasets = xt
        .cols_margin
        .iter()
        .enumerate()
        .map(|(i, col)| Dataset {
            label: col.label().to_string(),
            background_color: PALETTE[i % PALETTE.len()].to_string(),
            data: labels
                .iter()
                .map(|row| {
                    xt.cell(row, col.label())
                        .map(|c| c.failure_pct)
                        .unwrap_or(0.0)
                })
                .collect(),
        })
        .collect();

    let pie_chart = PieChart {
        labels: xt.cols_margin.iter().map(|r| r.label().to_string()).collect(),
        values: xt.cols_margin.iter().map(|r| r.failure_pct).collect(),
        background_color: xt
            .cols_margin
            .iter()
            .enumerate()
            .map(|(i, _)| PALETTE[i % PALETTE.len()].to_string())
            .collect(),
        title: format!("Failure % by {} for {}", secondary.heading(), subject),
    };

    // The synthetic TOTAL row belongs to tables, not charts.
    let mut ranked = pareto::rank(&xt.cols_margin);
    ranked.pop();
    let pareto_chart = ParetoChart {
        labels: ranked.iter().map(|r| r.label.clone()).collect(),
        values: ranked.iter().map(|r| r.failures).collect(),
        cumulative: ranked.iter().map(|r| r.cumulative_pct).collect(),
        title: format!(
            "Pareto Analysis of Failures by {} for {}",
            secondary.heading(),
            subject
        ),
    };

    let (headers, rows) =
        PivotTable::build(records, primary, secondary, "Total (All Types)").flatten();

    ChartPayload {
        title: format!("Failure Analysis for {}", subject),
        labels,
        values,
        datasets,
        pie_chart,
        pareto_chart,
        table_data: TableData { headers, rows },
    }
}
