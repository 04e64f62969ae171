pub mod batch;
pub mod classify;
pub mod config;
pub mod dates;
pub mod github;
pub mod metrics;
pub mod models;
pub mod report;
pub mod window;

use config::AppConfig;
use dates::DateRange;
use github::GitHubClient;
use report::{Report, ReportAssembler, ReportConfig, ReportKind};

/// Builds one report against GitHub for the given window.
///
/// The remaining API quota is logged before and after the run.
pub async fn run_report(
    config: &AppConfig,
    kind: ReportKind,
    range: &DateRange,
) -> anyhow::Result<Report> {
    let client = GitHubClient::new(config)?;
    client.log_rate_limit().await;

    let assembler = ReportAssembler::new(&client, ReportConfig::for_kind(config, kind));
    let report = assembler.run(kind, range).await?;

    tracing::info!(rows = report.len(), ?kind, "Report assembled");
    client.log_rate_limit().await;

    Ok(report)
}
