//! Check command - verify the credentials without submitting.

use anyhow::{anyhow, Result};
use renraku_core::Config;
use renraku_fetch::host::http::CALENDAR_PATH;
use renraku_fetch::{PortalSession, SessionClient};

use crate::Cli;

/// Logs in, then fetches the calendar page within the same session.
pub async fn run(cli: &Cli) -> Result<()> {
    let config = Config::from_env()?;
    let session = SessionClient::from_config(&config)?;

    session
        .login(&config.credentials)
        .await
        .map_err(|e| anyhow!("login failed: {e}"))?;

    let page = session
        .get_page(CALENDAR_PATH)
        .await
        .map_err(|e| anyhow!("calendar page fetch failed: {e}"))?;

    if !cli.quiet {
        println!("✓ Logged in to {}", session.base_url());
        println!("  {} {}", page.status, page.url);
        if cli.verbose {
            println!("{}", page.dump);
        }
    }

    Ok(())
}
