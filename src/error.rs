use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Error taxonomy for the reporting service.
///
/// The aggregation core (`age`, `filter`, `tabulate`, `pareto`, `pivot`) is
/// kept total wherever a sane default exists; these variants cover the
/// boundaries: configuration lookup, the external data fetch, request
/// validation and report-file retrieval.
#[derive(Debug, Error)]
pub enum Error {
    /// Credentials or service configuration could not be resolved.
    #[error("configuration error: {0}")]
    Config(String),

    /// The external data fetch failed (network, auth, malformed payload).
    #[error("data source error: {0}")]
    Source(String),

    /// The fetched table is missing columns the pipeline requires.
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Filtering produced an empty set for the requested criteria.
    #[error("no data found for {dimension}: {value}")]
    NoData { dimension: String, value: String },

    /// A requested date range failed validation.
    #[error("invalid date range: {0}")]
    BadDateRange(String),

    /// Strict age parsing rejected a raw age value.
    #[error("unparseable age value: {0:?}")]
    BadAge(String),

    /// The request's dropdown selections leave nothing to group by.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// A report file was requested that does not exist (or the name was
    /// rejected by the traversal check).
    #[error("report not found: {0}")]
    ReportNotFound(String),

    #[error("report write failed: {0}")]
    ReportWrite(#[from] std::io::Error),

    #[error("spreadsheet generation failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    fn status(&self) -> StatusCode {
        match self {
            Error::Config(_) | Error::Source(_) | Error::ReportWrite(_) | Error::Xlsx(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Error::MissingColumns(_) | Error::NoData { .. } | Error::ReportNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Error::BadDateRange(_) | Error::BadAge(_) | Error::InvalidSelection(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl IntoResponse for Error {
    /// Convert an error into the JSON error payload the client expects.
    ///
    /// Every failure is caught at the handler boundary and becomes a
    /// structured `{"error": ...}` response; nothing propagates as a fault
    /// that could take the process down.
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("request failed: {}", self);
        } else {
            log::warn!("request rejected: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_data_message_names_the_criteria() {
        let err = Error::NoData {
            dimension: "Make".to_string(),
            value: "KONI".to_string(),
        };
        assert_eq!(err.to_string(), "no data found for Make: KONI");
    }

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(
            Error::BadDateRange("start after end".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::ReportNotFound("x.xlsx".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::Config("GOOGLE_CREDS not set".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
