use damper_report::app;
use damper_report::config::AppConfig;

/// Server entry point: read configuration from the environment and run the
/// reporting service until shutdown.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = AppConfig::from_env()?;
    log::info!(
        "starting damper-report (reports dir: {})",
        config.reports_dir.display()
    );

    app::run(config).await
}
