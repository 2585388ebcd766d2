//! Run command - register one entry.

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use renraku_core::{Config, RecordSource};
use renraku_fetch::{build_provider, SessionClient, SubmissionRunner};
use tracing::{info, warn};

use super::entry_date;
use crate::Cli;

/// Arguments for the run command.
#[derive(Args, Default)]
pub struct RunArgs {
    /// Record source (auto, static, store).
    #[arg(long, default_value = "auto")]
    pub source: RecordSource,

    /// Register for this date (YYYY-MM-DD) instead of today.
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

/// Runs the run command. Ctrl-C cancels the in-flight step.
pub async fn run(args: &RunArgs, cli: &Cli) -> Result<()> {
    let config = Config::from_env()?;
    let source = config.resolve_source(args.source)?;
    let provider = build_provider(&config, source)?;
    let session = SessionClient::from_config(&config)?;
    let date = entry_date(&config, args.date);

    info!(source = %args.source, provider = %provider.id(), kind = %provider.kind(), %date, "Running");

    let runner = SubmissionRunner::new(
        &session,
        provider.as_ref(),
        &config.credentials,
        &config.child_id,
    );
    let report = runner.execute_until(date, interrupted()).await?;

    if !cli.quiet {
        println!(
            "Registered entry for {} from {} ({:.2}s)",
            report.date,
            report.provider_kind,
            report.duration.as_secs_f64()
        );
    }

    Ok(())
}

/// Completes on Ctrl-C. Never completes if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
