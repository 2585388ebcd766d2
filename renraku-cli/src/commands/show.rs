//! Show command - print the record without contacting the portal.

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use renraku_core::{Config, RecordSource};
use renraku_fetch::build_provider;

use super::entry_date;

/// Arguments for the show command.
#[derive(Args)]
pub struct ShowArgs {
    /// Record source (auto, static, store).
    #[arg(long, default_value = "auto")]
    pub source: RecordSource,

    /// Produce the record for this date (YYYY-MM-DD) instead of today.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Pretty-print instead of the exact save-data blob.
    #[arg(long)]
    pub pretty: bool,
}

/// Runs the show command.
pub async fn run(args: &ShowArgs) -> Result<()> {
    let config = Config::from_env()?;
    let source = config.resolve_source(args.source)?;
    let provider = build_provider(&config, source)?;

    let record = provider.produce(entry_date(&config, args.date)).await?;

    if args.pretty {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!("{}", record.to_save_data()?);
    }

    Ok(())
}
