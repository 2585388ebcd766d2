// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! renraku CLI - daily contact-book registration.
//!
//! # Examples
//!
//! ```bash
//! # Register today's entry (default command)
//! renraku
//!
//! # Back-fill a day from the static defaults
//! renraku run --source static --date 2023-02-28
//!
//! # Serve the HTTP trigger on $PORT
//! renraku serve
//!
//! # Print the save-data blob without contacting the portal
//! renraku show --pretty
//!
//! # Verify the credentials
//! renraku check
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{check, run, serve, show};

// ============================================================================
// CLI Definition
// ============================================================================

/// renraku CLI - daily contact-book registration.
#[derive(Parser)]
#[command(name = "renraku")]
#[command(about = "Registers the daily contact-book entry on the parents portal")]
#[command(long_about = r#"
renraku logs in to the parents portal and registers one contact-book entry
for the configured child.

Environment:
  ACCOUNT, PASSWORD, CHILD_ID          required
  PROJECT_ID, SAVE_DATA_COLLECTION,
  SAVE_DATA_DOCUMENT                   document store source (all or none)
  PORTAL_BASE_URL                      portal origin
  RENRAKU_TIMEZONE                     entry date zone (default Asia/Tokyo)
  RENRAKU_TIMEOUT_SECS                 per-request timeout (default 30)
  FIRESTORE_EMULATOR_HOST              document store emulator
  PORT                                 serve port (default 8080)
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run. If none, runs 'run' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Quiet mode (no logs, errors only).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Register one entry (default if no command specified).
    #[command(visible_alias = "r")]
    Run(run::RunArgs),

    /// Serve the HTTP trigger; every request registers one entry.
    Serve(serve::ServeArgs),

    /// Print the record that would be submitted.
    Show(show::ShowArgs),

    /// Log in and fetch the calendar page without submitting.
    Check,
}

/// CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// Any failure.
    Error = 1,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code as u8)
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return; // No logging in quiet mode
    }

    let filter = if verbose {
        EnvFilter::new("renraku=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("renraku=info"))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result: Result<()> = match &cli.command {
        Some(Commands::Run(args)) => run::run(args, &cli).await,
        Some(Commands::Serve(args)) => serve::run(args).await,
        Some(Commands::Show(args)) => show::run(args).await,
        Some(Commands::Check) => check::run(&cli).await,
        None => {
            // Default to run command
            run::run(&run::RunArgs::default(), &cli).await
        }
    };

    let code = match result {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::Error
        }
    };
    code.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use renraku_core::RecordSource;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_is_run() {
        let cli = Cli::try_parse_from(["renraku"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_run_args() {
        let cli =
            Cli::try_parse_from(["renraku", "run", "--source", "static", "--date", "2023-02-28"])
                .unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.source, RecordSource::Static);
        assert_eq!(args.date.unwrap().to_string(), "2023-02-28");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::Success as u8, 0);
        assert_eq!(ExitCode::Error as u8, 1);
    }

    #[test]
    fn test_serve_deadline_must_be_positive() {
        assert!(Cli::try_parse_from(["renraku", "serve", "--deadline", "0"]).is_err());

        let cli = Cli::try_parse_from(["renraku", "serve", "--deadline", "1"]).unwrap();
        let Some(Commands::Serve(args)) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.deadline, 1);
    }

    #[test]
    fn test_rejects_unknown_source() {
        assert!(Cli::try_parse_from(["renraku", "run", "--source", "cloud"]).is_err());
        assert!(Cli::try_parse_from(["renraku", "run", "--date", "2023/02/28"]).is_err());
    }
}
