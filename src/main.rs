use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::Parser;
use pr_kpis::config::AppConfig;
use pr_kpis::dates::DateRange;
use pr_kpis::report::ReportKind;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Merged pull request reports, printed as CSV for spreadsheet import.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Which report to build.
    #[arg(value_enum)]
    report: ReportKind,
    /// Start of the time range (YYYY-MM-DD). Defaults to one month ago.
    #[arg(long)]
    start: Option<NaiveDate>,
    /// End of the time range (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    end: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries only the report.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pr_kpis=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env().context("Failed to load configuration from environment")?;
    let range = DateRange::resolve(args.start, args.end, Utc::now().date_naive())?;

    tracing::info!(start = %range.start, end = %range.end, "Building {:?} report", args.report);

    let report = pr_kpis::run_report(&config, args.report, &range).await?;
    report.write_csv(std::io::stdout().lock())?;

    Ok(())
}
