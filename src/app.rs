#![cfg(not(tarpaulin_include))]

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::age::{AgeBucket, AgeParseMode};
use crate::cache::DatasetCache;
use crate::charts;
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::filter::{DateRange, Dimension, FilterCriteria, Selection};
use crate::pivot::PivotTable;
use crate::record::Record;
use crate::report::{Report, ReportStore, safe_filename};
use crate::session::SessionStore;
use crate::source::DataSource;
use crate::tabulate;

pub struct AppState {
    age_mode: AgeParseMode,
    source: DataSource,
    cache: DatasetCache,
    sessions: SessionStore,
    reports: ReportStore,
}

#[derive(Deserialize)]
struct PeriodQuery {
    start_date: String,
    end_date: String,
    next: Option<String>,
}

#[derive(Deserialize)]
struct ValueQuery {
    #[serde(default)]
    value: String,
}

#[derive(Deserialize)]
struct MakeQuery {
    #[serde(default)]
    make: String,
}

#[derive(Deserialize, Default)]
struct FilterParams {
    #[serde(default)]
    make: Option<String>,
    #[serde(default)]
    damper_type: Option<String>,
    #[serde(default)]
    age_group: Option<String>,
}

pub async fn run(config: AppConfig) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let reports = ReportStore::open(&config.reports_dir)?;
    let state = Arc::new(AppState {
        age_mode: config.age_mode,
        source: config.source.clone(),
        cache: DatasetCache::new(config.cache_ttl),
        sessions: SessionStore::new(),
        reports,
    });

    let app = Router::new()
        .route("/", get(serve_home))
        .route("/charts", get(serve_charts))
        .route("/set_period", get(set_period))
        .route("/filter", get(filter_analysis).post(filter_analysis_form))
        .route("/analyze_make", get(analyze_make))
        .route("/analyze_type", get(analyze_type))
        .route("/analyze_age", get(analyze_age))
        .route("/chart_make_analysis", get(chart_make))
        .route("/chart_type_analysis", get(chart_type))
        .route("/chart_age_analysis", get(chart_age))
        .route("/get_all_makes", get(all_makes))
        .route("/get_all_types", get(all_types))
        .route("/get_all_age_groups", get(all_age_groups))
        .route("/download/reports/:filename", get(download_named))
        .route("/download", get(download_last))
        .route("/refresh_data", post(refresh_data))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    log::info!("listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_home() -> Html<&'static str> {
    Html(include_str!("./static/home.html"))
}

async fn serve_charts() -> Html<&'static str> {
    Html(include_str!("./static/charts.html"))
}

/// Fetch the dataset through the cache.
async fn dataset(state: &AppState) -> Result<Arc<Vec<Record>>> {
    state.cache.records(&state.source, state.age_mode).await
}

/// Store the picked period in the session, then bounce to the next page.
async fn set_period(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<PeriodQuery>,
) -> Result<(CookieJar, Redirect)> {
    // Validate before storing so later requests never see a bad range.
    DateRange::parse(&query.start_date, &query.end_date)?;
    let (jar, sid) = state.sessions.ensure(jar);
    state.sessions.update(&sid, |s| {
        s.start_date = Some(query.start_date.trim().to_string());
        s.end_date = Some(query.end_date.trim().to_string());
    });
    let next = query.next.unwrap_or_else(|| "/filter".to_string());
    Ok((jar, Redirect::to(&next)))
}

async fn filter_analysis(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<FilterParams>,
) -> Result<Response> {
    run_filter_analysis(state, jar, params).await
}

async fn filter_analysis_form(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    axum::Form(params): axum::Form<FilterParams>,
) -> Result<Response> {
    run_filter_analysis(state, jar, params).await
}

/// The combined-filter summary: group by every non-excluded dimension,
/// append totals, render the table and write the shared report file.
async fn run_filter_analysis(
    state: Arc<AppState>,
    jar: CookieJar,
    params: FilterParams,
) -> Result<Response> {
    let (jar, sid) = state.sessions.ensure(jar);
    let criteria = FilterCriteria {
        period: state.sessions.period(&sid)?,
        make: Selection::parse(params.make.as_deref().unwrap_or("ALL")),
        damper_type: Selection::parse(params.damper_type.as_deref().unwrap_or("ALL")),
        age_group: Selection::parse(params.age_group.as_deref().unwrap_or("ALL")),
    };

    let dims = criteria.grouping_dimensions();
    if dims.is_empty() {
        return Err(Error::InvalidSelection(
            "every dimension is set to NONE; nothing to group by".to_string(),
        ));
    }

    let records = dataset(&state).await?;
    let filtered = criteria.apply(&records);
    if filtered.is_empty() {
        return Err(Error::NoData {
            dimension: "selected filters".to_string(),
            value: describe_selection(&criteria),
        });
    }

    let rows = tabulate::with_totals(tabulate::aggregate(&filtered, &dims));
    let mut headers: Vec<String> = dims.iter().map(|d| d.heading().to_string()).collect();
    headers.extend([
        "Failures".to_string(),
        "Total Receipts".to_string(),
        "Failure %".to_string(),
    ]);
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            let mut out = r.keys.clone();
            out.push(r.failures.to_string());
            out.push(r.total.to_string());
            out.push(format!("{:.2}", r.failure_pct));
            out
        })
        .collect();

    let report = Report {
        heading: "Filtered Damper Failure Summary".to_string(),
        headers,
        rows: body,
    };

    let filename = "Filtered_Damper_Data.xlsx".to_string();
    state.reports.save(&filename, &report.xlsx()?)?;
    state
        .sessions
        .update(&sid, |s| s.report_file = Some(filename.clone()));

    Ok((jar, Html(page(&report.html(), &filename))).into_response())
}

async fn analyze_make(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<ValueQuery>,
) -> Result<Response> {
    analyze_dimension(state, jar, Dimension::Make, &query.value, "Make_Analysis").await
}

async fn analyze_type(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<ValueQuery>,
) -> Result<Response> {
    analyze_dimension(state, jar, Dimension::DamperType, &query.value, "Type_Analysis").await
}

/// Make/type analysis: pivot the other classification dimension against the
/// age buckets for the one selected value.
async fn analyze_dimension(
    state: Arc<AppState>,
    jar: CookieJar,
    dim: Dimension,
    raw_value: &str,
    file_prefix: &str,
) -> Result<Response> {
    let (jar, sid) = state.sessions.ensure(jar);
    let selection = Selection::parse(raw_value);
    let shown = if raw_value.trim().is_empty() {
        "ALL"
    } else {
        raw_value.trim()
    };

    let mut criteria = FilterCriteria::default().with_period(state.sessions.period(&sid)?);
    match dim {
        Dimension::Make => criteria.make = selection,
        Dimension::DamperType => criteria.damper_type = selection,
        Dimension::AgeBucket => criteria.age_group = selection,
    }

    let records = dataset(&state).await?;
    let filtered = criteria.apply(&records);
    if filtered.is_empty() {
        return Err(Error::NoData {
            dimension: dim.heading().to_string(),
            value: shown.to_string(),
        });
    }

    let row_dim = match dim {
        Dimension::Make => Dimension::DamperType,
        _ => Dimension::Make,
    };
    let pivot = PivotTable::build(&filtered, row_dim, Dimension::AgeBucket, "All Types");
    let (headers, rows) = pivot.flatten();

    let report = Report {
        heading: format!("Failure Analysis Report for {}: {}", dim.heading(), shown),
        headers,
        rows,
    };

    let filename = safe_filename(file_prefix, shown);
    state.reports.save(&filename, &report.xlsx()?)?;
    state
        .sessions
        .update(&sid, |s| s.report_file = Some(filename.clone()));

    Ok((jar, Html(page(&report.html(), &filename))).into_response())
}

/// Age-group analysis, answered as JSON for the AJAX page: the table HTML
/// plus the freshly written report's download link.
async fn analyze_age(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<ValueQuery>,
) -> Result<Response> {
    let (jar, sid) = state.sessions.ensure(jar);
    let value = query.value.trim().to_string();
    let bucket = AgeBucket::from_label(&value).ok_or_else(|| Error::NoData {
        dimension: "Age Group".to_string(),
        value: value.clone(),
    })?;

    let criteria = FilterCriteria {
        period: state.sessions.period(&sid)?,
        age_group: Selection::Value(bucket.label().to_string()),
        ..Default::default()
    };

    let records = dataset(&state).await?;
    let filtered = criteria.apply(&records);
    if filtered.is_empty() {
        return Err(Error::NoData {
            dimension: "Age Group".to_string(),
            value,
        });
    }

    let pivot = PivotTable::build(
        &filtered,
        Dimension::DamperType,
        Dimension::Make,
        "Total (All Types)",
    );
    let (headers, rows) = pivot.flatten();
    let report = Report {
        heading: format!("Failure Summary for Age Group: {}", bucket.label()),
        headers,
        rows,
    };

    let filename = safe_filename("Age_Analysis", bucket.label());
    state.reports.save(&filename, &report.xlsx()?)?;
    state
        .sessions
        .update(&sid, |s| s.report_file = Some(filename.clone()));

    let payload = serde_json::json!({
        "table_html": report.html(),
        "download_link": format!("/download/reports/{}", filename),
    });
    Ok((jar, Json(payload)).into_response())
}

async fn chart_make(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<MakeQuery>,
) -> Result<Response> {
    chart_analysis(
        state,
        jar,
        Dimension::Make,
        &query.make,
        Dimension::DamperType,
        Dimension::AgeBucket,
    )
    .await
}

async fn chart_type(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<ValueQuery>,
) -> Result<Response> {
    chart_analysis(
        state,
        jar,
        Dimension::DamperType,
        &query.value,
        Dimension::Make,
        Dimension::AgeBucket,
    )
    .await
}

async fn chart_age(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<ValueQuery>,
) -> Result<Response> {
    chart_analysis(
        state,
        jar,
        Dimension::AgeBucket,
        &query.value,
        Dimension::DamperType,
        Dimension::Make,
    )
    .await
}

async fn chart_analysis(
    state: Arc<AppState>,
    jar: CookieJar,
    filter_dim: Dimension,
    raw_value: &str,
    primary: Dimension,
    secondary: Dimension,
) -> Result<Response> {
    let (jar, sid) = state.sessions.ensure(jar);
    let shown = if raw_value.trim().is_empty() {
        "ALL"
    } else {
        raw_value.trim()
    };

    let mut criteria = FilterCriteria::default().with_period(state.sessions.period(&sid)?);
    let selection = Selection::parse(raw_value);
    match filter_dim {
        Dimension::Make => criteria.make = selection,
        Dimension::DamperType => criteria.damper_type = selection,
        Dimension::AgeBucket => criteria.age_group = selection,
    }

    let records = dataset(&state).await?;
    let filtered = criteria.apply(&records);
    if filtered.is_empty() {
        return Err(Error::NoData {
            dimension: filter_dim.heading().to_string(),
            value: shown.to_string(),
        });
    }

    let subject = format!("{}: {}", filter_dim.heading(), shown);
    let payload = charts::build_payload(&filtered, primary, secondary, &subject);
    Ok((jar, Json(payload)).into_response())
}

async fn all_makes(State(state): State<Arc<AppState>>) -> Result<Response> {
    let values = distinct(&dataset(&state).await?, Dimension::Make);
    Ok(Json(serde_json::json!({ "makes": values })).into_response())
}

async fn all_types(State(state): State<Arc<AppState>>) -> Result<Response> {
    let values = distinct(&dataset(&state).await?, Dimension::DamperType);
    Ok(Json(serde_json::json!({ "types": values })).into_response())
}

async fn all_age_groups() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "age_groups": AgeBucket::labels() }))
}

fn distinct(records: &[Record], dim: Dimension) -> Vec<String> {
    records
        .iter()
        .map(|r| dim.value_of(r))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

async fn download_named(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response> {
    let bytes = state.reports.load(&filename)?;
    Ok(attachment(&filename, bytes))
}

/// Fall back to the last report this session generated.
async fn download_last(State(state): State<Arc<AppState>>, jar: CookieJar) -> Result<Response> {
    let (_, sid) = state.sessions.ensure(jar);
    let filename = state
        .sessions
        .get(&sid)
        .report_file
        .ok_or_else(|| Error::ReportNotFound("no report generated yet".to_string()))?;
    let bytes = state.reports.load(&filename)?;
    Ok(attachment(&filename, bytes))
}

/// Drop the cached dataset so the next request refetches from the source.
async fn refresh_data(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.cache.invalidate();
    Json(serde_json::json!({ "status": "ok" }))
}

fn attachment(filename: &str, bytes: Vec<u8>) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_TYPE,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        )
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(axum::body::Body::from(bytes))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

const TABLE_STYLE: &str = r#"<style>
.table { width: 100%; border-collapse: collapse; margin-bottom: 20px; color: #333; }
.table th { background-color: #3c6382; color: white; text-align: center; padding: 8px; border: 1px solid #ddd; }
.table td { text-align: center; padding: 8px; border: 1px solid #ddd; background-color: #f9f9f9; }
.table tr:nth-child(even) td { background-color: #f2f2f2; }
.table tr:last-child td { background-color: #c7ecee; font-weight: bold; }
.table td:first-child { font-weight: bold; background-color: #e6f2ff; }
</style>"#;

/// Wrap a rendered table fragment in a minimal page with its download link.
fn page(fragment: &str, filename: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>Damper Failure Report</title>{}</head>\
         <body>{}<p><a href=\"/download/reports/{}\">Download report</a> | <a href=\"/\">Home</a></p></body></html>",
        TABLE_STYLE, fragment, filename
    )
}

fn describe_selection(criteria: &FilterCriteria) -> String {
    let show = |s: &Selection| match s {
        Selection::All => "ALL".to_string(),
        Selection::Excluded => "NONE".to_string(),
        Selection::Value(v) => v.clone(),
    };
    format!(
        "Make={}, TYPE OF DAMPER={}, Age Group={}",
        show(&criteria.make),
        show(&criteria.damper_type),
        show(&criteria.age_group)
    )
}
