//! Serve command - HTTP trigger for scheduled runs.
//!
//! `GET /` and `POST /` each perform one complete run with a fresh portal
//! session. The answer is `200 OK` with body `OK`, or `500` with the error
//! text. A run ends early when the request is dropped or the deadline
//! passes.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use clap::Args;
use renraku_core::{today_in, Config, RecordSource};
use renraku_fetch::{build_provider, RunReport, SessionClient, SubmissionRunner};
use tracing::{error, info};

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Record source (auto, static, store).
    #[arg(long, default_value = "auto")]
    pub source: RecordSource,

    /// Seconds a single run may take before it is cancelled.
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub deadline: u64,
}

struct TriggerState {
    config: Config,
    source: RecordSource,
    deadline: Duration,
}

/// Runs the serve command.
pub async fn run(args: &ServeArgs) -> Result<()> {
    let config = Config::from_env()?;
    // A store source without a store location is a startup error.
    config.resolve_source(args.source)?;

    let state = Arc::new(TriggerState {
        config,
        source: args.source,
        deadline: Duration::from_secs(args.deadline),
    });

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, source = %args.source, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn router(state: Arc<TriggerState>) -> Router {
    Router::new()
        .route("/", get(trigger).post(trigger))
        .with_state(state)
}

async fn trigger(State(state): State<Arc<TriggerState>>) -> (StatusCode, String) {
    outcome_response(&submit_once(&state).await)
}

/// One run with a fresh session and provider.
async fn submit_once(state: &TriggerState) -> Result<RunReport> {
    let config = &state.config;
    let source = config.resolve_source(state.source)?;
    let provider = build_provider(config, source)?;
    let session = SessionClient::from_config(config)?;

    let runner = SubmissionRunner::new(
        &session,
        provider.as_ref(),
        &config.credentials,
        &config.child_id,
    );
    let deadline = tokio::time::sleep(state.deadline);
    Ok(runner.execute_until(today_in(config.timezone), deadline).await?)
}

/// Maps a run outcome to the trigger's HTTP answer.
fn outcome_response(outcome: &Result<RunReport>) -> (StatusCode, String) {
    match outcome {
        Ok(report) => {
            info!(
                date = %report.date,
                kind = %report.provider_kind,
                duration = ?report.duration,
                "Trigger run succeeded"
            );
            (StatusCode::OK, "OK".to_string())
        }
        Err(e) => {
            error!(error = %e, "Trigger run failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use renraku_fetch::{CancelledAt, ProviderKind, RunError, RunStage, StageRecord};

    use super::*;

    fn report() -> RunReport {
        RunReport {
            date: NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
            provider_id: "static".to_string(),
            provider_kind: ProviderKind::Static,
            stages: vec![StageRecord {
                stage: RunStage::Submitted,
                duration: Duration::from_millis(5),
            }],
            duration: Duration::from_millis(15),
        }
    }

    #[test]
    fn test_success_is_ok() {
        let (status, body) = outcome_response(&Ok(report()));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[test]
    fn test_failure_is_500_with_message() {
        let err = RunError::Cancelled(CancelledAt(RunStage::RecordReady));
        let (status, body) = outcome_response(&Err(err.into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "run cancelled while submitting");
    }
}
