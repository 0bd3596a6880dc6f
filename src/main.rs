use chrono::Local;
use streamflow_stats::config::Config;
use streamflow_stats::normalizer::Normalizer;
use streamflow_stats::pipeline::Pipeline;
use streamflow_stats::report::ReportWriter;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,streamflow_stats=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path =
        std::env::var("STREAMFLOW_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let config = Config::load(&config_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration from {}: {}\n\n\
             Make sure:\n\
             1. The config file exists (or set STREAMFLOW_CONFIG)\n\
             2. All referenced environment variables are set\n\
             3. Create a .env file if needed",
            config_path,
            e
        )
    })?;
    info!("Configuration loaded from {}", config_path);

    let document = Normalizer::load_document(&config.input.path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load daily values from {}: {}",
            config.input.path.display(),
            e
        )
    })?;

    let options = config.pipeline_options(Local::now().date_naive())?;
    let pipeline = Pipeline::new(options);
    let (report, stats) = pipeline.run_document(&document, &config.input.series_filter())?;

    if stats.malformed() > 0 {
        warn!("{} malformed points were skipped", stats.malformed());
    }

    if let Some(longest) = report.rankings.dry_streaks.first() {
        info!(
            "Longest dry streak: {} days ({} to {})",
            longest.length, longest.start, longest.end
        );
    }
    if let Some(longest) = report.rankings.wet_streaks.first() {
        info!(
            "Longest wet streak: {} days ({} to {})",
            longest.length, longest.start, longest.end
        );
    }
    if let Some(peak) = report.rankings.top_flow_days.first() {
        info!("Highest daily mean flow: {} on {}", peak.mean_flow, peak.date);
    }

    let written =
        ReportWriter::new(&config.output.directory).write(&report, &config.output.formats)?;
    for path in written {
        info!("Wrote {}", path.display());
    }

    Ok(())
}
