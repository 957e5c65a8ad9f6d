use crate::age::AgeParseMode;
use crate::credentials::CredentialProvider;
use crate::error::{Error, Result};
use crate::source::DataSource;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, read from the environment at startup.
///
/// | variable                  | meaning                                  | default          |
/// |---------------------------|------------------------------------------|------------------|
/// | `DAMPER_BIND`             | listen address                           | `127.0.0.1:3000` |
/// | `DAMPER_REPORTS_DIR`      | reports output directory                 | `reports`        |
/// | `DAMPER_CACHE_TTL_SECS`   | dataset cache TTL                        | `60`             |
/// | `DAMPER_STRICT_AGE`       | `1`/`true` rejects unparseable ages      | lenient          |
/// | `DAMPER_CSV_PATH`         | local CSV data source                    | —                |
/// | `DAMPER_SHEET_URL`        | remote sheet CSV-export URL              | —                |
/// | `GOOGLE_CREDS`            | inline service-account JSON              | —                |
/// | `GOOGLE_CREDS_B64`        | base64 service-account JSON              | —                |
/// | `GOOGLE_CREDS_FILE`       | path to service-account JSON             | —                |
///
/// Exactly one of `DAMPER_CSV_PATH` / `DAMPER_SHEET_URL` selects the data
/// source; the sheet variant additionally needs one credential variable.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub reports_dir: PathBuf,
    pub cache_ttl: Duration,
    pub age_mode: AgeParseMode,
    pub source: DataSource,
}

impl AppConfig {
    pub fn from_env() -> Result<AppConfig> {
        let bind_addr = env::var("DAMPER_BIND").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
        let reports_dir =
            PathBuf::from(env::var("DAMPER_REPORTS_DIR").unwrap_or_else(|_| "reports".to_string()));

        let cache_ttl = match env::var("DAMPER_CACHE_TTL_SECS") {
            Ok(raw) => Duration::from_secs(raw.parse::<u64>().map_err(|_| {
                Error::Config(format!("DAMPER_CACHE_TTL_SECS is not a number: {:?}", raw))
            })?),
            Err(_) => Duration::from_secs(60),
        };

        let age_mode = match env::var("DAMPER_STRICT_AGE").ok().as_deref() {
            Some("1") | Some("true") | Some("TRUE") => AgeParseMode::Strict,
            _ => AgeParseMode::Lenient,
        };

        let source = match (env::var("DAMPER_CSV_PATH"), env::var("DAMPER_SHEET_URL")) {
            (Ok(path), Err(_)) => DataSource::CsvFile {
                path: PathBuf::from(path),
            },
            (Err(_), Ok(url)) => DataSource::SheetExport {
                url,
                credentials: credential_provider()?,
            },
            (Ok(_), Ok(_)) => {
                return Err(Error::Config(
                    "set only one of DAMPER_CSV_PATH and DAMPER_SHEET_URL".to_string(),
                ));
            }
            (Err(_), Err(_)) => {
                return Err(Error::Config(
                    "no data source configured: set DAMPER_CSV_PATH or DAMPER_SHEET_URL".to_string(),
                ));
            }
        };

        Ok(AppConfig {
            bind_addr,
            reports_dir,
            cache_ttl,
            age_mode,
            source,
        })
    }
}

/// Pick the credential provider from whichever variable is set, checked in
/// a fixed order: inline JSON, then base64, then file path.
fn credential_provider() -> Result<CredentialProvider> {
    if let Ok(json) = env::var("GOOGLE_CREDS") {
        return Ok(CredentialProvider::Inline(json));
    }
    if let Ok(encoded) = env::var("GOOGLE_CREDS_B64") {
        return Ok(CredentialProvider::Base64(encoded));
    }
    if let Ok(path) = env::var("GOOGLE_CREDS_FILE") {
        return Ok(CredentialProvider::File(PathBuf::from(path)));
    }
    Err(Error::Config(
        "GOOGLE_CREDS, GOOGLE_CREDS_B64 or GOOGLE_CREDS_FILE must be set".to_string(),
    ))
}
