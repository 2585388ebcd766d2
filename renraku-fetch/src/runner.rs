//! Submission runner: login, produce the record, submit it.
//!
//! The runner walks `Init → LoggedIn → RecordReady → Submitted`. The first
//! failing step ends the run; nothing is retried. A run can be tied to a
//! cancellation future, in which case the in-flight step is dropped and the
//! run reports where it stopped.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use renraku_core::{Credentials, SubmissionForm};
use tracing::{debug, info, instrument, warn};

use crate::error::{CancelledAt, RecordError, RunError};
use crate::host::http::{PortalSession, REGIST_PATH};
use crate::strategy::{ProviderKind, RecordProvider};

// ============================================================================
// Run Stage
// ============================================================================

/// Progress of a run. Each variant is the state reached so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStage {
    /// Nothing done yet.
    Init,
    /// The portal accepted the login.
    LoggedIn,
    /// The record is finalized and encoded.
    RecordReady,
    /// The portal accepted the registration.
    Submitted,
}

impl RunStage {
    /// Returns the stage name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::LoggedIn => "logged_in",
            Self::RecordReady => "record_ready",
            Self::Submitted => "submitted",
        }
    }
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Run Report
// ============================================================================

/// A stage transition and the time the step leading to it took.
#[derive(Debug, Clone)]
pub struct StageRecord {
    /// Stage reached.
    pub stage: RunStage,
    /// How long the step took.
    pub duration: Duration,
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Date the entry was registered for.
    pub date: NaiveDate,
    /// ID of the provider that produced the record.
    pub provider_id: String,
    /// Where the record's values came from.
    pub provider_kind: ProviderKind,
    /// Stages in the order they were reached.
    pub stages: Vec<StageRecord>,
    /// Total wall time.
    pub duration: Duration,
}

impl RunReport {
    /// Returns the last stage reached.
    pub fn final_stage(&self) -> RunStage {
        self.stages.last().map_or(RunStage::Init, |s| s.stage)
    }
}

// ============================================================================
// Submission Runner
// ============================================================================

/// Drives one run against a portal session and a record provider.
///
/// The session must be fresh for each run; the runner relies on `login`
/// establishing the cookies that `submit` presents.
pub struct SubmissionRunner<'a> {
    session: &'a dyn PortalSession,
    provider: &'a dyn RecordProvider,
    credentials: &'a Credentials,
    child_id: &'a str,
}

impl<'a> SubmissionRunner<'a> {
    /// Creates a runner.
    pub fn new(
        session: &'a dyn PortalSession,
        provider: &'a dyn RecordProvider,
        credentials: &'a Credentials,
        child_id: &'a str,
    ) -> Self {
        Self {
            session,
            provider,
            credentials,
            child_id,
        }
    }

    /// Runs to completion for `date`.
    ///
    /// # Errors
    ///
    /// Returns the `RunError` of the first failing step.
    pub async fn execute(&self, date: NaiveDate) -> Result<RunReport, RunError> {
        self.execute_until(date, std::future::pending()).await
    }

    /// Runs for `date`, giving up as soon as `cancel` completes.
    ///
    /// # Errors
    ///
    /// Returns the `RunError` of the first failing step, or
    /// `RunError::Cancelled` naming the step that was in flight.
    #[instrument(skip(self, cancel), fields(provider = %self.provider.id(), kind = %self.provider.kind()))]
    pub async fn execute_until<C>(&self, date: NaiveDate, cancel: C) -> Result<RunReport, RunError>
    where
        C: Future<Output = ()> + Send,
    {
        let start = Instant::now();
        let mut stages = Vec::with_capacity(3);
        tokio::pin!(cancel);

        info!(%date, "Starting submission run");

        // Init → LoggedIn
        let step = Instant::now();
        or_cancel(RunStage::Init, self.session.login(self.credentials), &mut cancel)
            .await?
            .map_err(RunError::Auth)?;
        stages.push(reached(RunStage::LoggedIn, step));

        // LoggedIn → RecordReady
        let step = Instant::now();
        let record = or_cancel(RunStage::LoggedIn, self.provider.produce(date), &mut cancel)
            .await??;
        let form = SubmissionForm::new(&record, self.child_id).map_err(RecordError::from)?;
        stages.push(reached(RunStage::RecordReady, step));

        // RecordReady → Submitted
        let step = Instant::now();
        info!(save_data = %form.save_data, "Submitting record");
        let fields = [
            ("save_data", form.save_data.as_str()),
            ("child_id", form.child_id.as_str()),
        ];
        or_cancel(
            RunStage::RecordReady,
            self.session.submit(REGIST_PATH, &fields),
            &mut cancel,
        )
        .await?
        .map_err(RunError::Submission)?;
        stages.push(reached(RunStage::Submitted, step));

        let duration = start.elapsed();
        info!(duration = ?duration, "Submission run finished");

        Ok(RunReport {
            date,
            provider_id: self.provider.id().to_string(),
            provider_kind: self.provider.kind(),
            stages,
            duration,
        })
    }
}

fn reached(stage: RunStage, step: Instant) -> StageRecord {
    let duration = step.elapsed();
    debug!(stage = %stage, duration = ?duration, "Stage reached");
    StageRecord { stage, duration }
}

/// Awaits `work` unless `cancel` completes first.
async fn or_cancel<T, C>(
    stage: RunStage,
    work: impl Future<Output = T>,
    cancel: &mut Pin<&mut C>,
) -> Result<T, RunError>
where
    C: Future<Output = ()>,
{
    tokio::select! {
        biased;
        () = cancel.as_mut() => {
            warn!(stage = %stage, "Run cancelled");
            Err(RunError::Cancelled(CancelledAt(stage)))
        }
        out = work => Ok(out),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use renraku_core::{CoreError, SubmissionRecord};
    use reqwest::StatusCode;

    use super::*;
    use crate::error::{PortalError, StoreError};
    use crate::strategy::StaticRecordProvider;

    #[derive(Default)]
    struct MockSession {
        reject_login: bool,
        reject_submit: bool,
        hang_login: bool,
        logins: Mutex<Vec<String>>,
        submits: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl MockSession {
        fn rejected() -> PortalError {
            PortalError::Status {
                status: StatusCode::FORBIDDEN,
                headers: String::new(),
                body: "denied".to_string(),
            }
        }
    }

    #[async_trait]
    impl PortalSession for MockSession {
        async fn login(&self, credentials: &Credentials) -> Result<(), PortalError> {
            if self.hang_login {
                std::future::pending::<()>().await;
            }
            self.logins.lock().unwrap().push(credentials.account.clone());
            if self.reject_login {
                return Err(Self::rejected());
            }
            Ok(())
        }

        async fn submit(&self, path: &str, fields: &[(&str, &str)]) -> Result<(), PortalError> {
            let fields = fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect();
            self.submits.lock().unwrap().push((path.to_string(), fields));
            if self.reject_submit {
                return Err(Self::rejected());
            }
            Ok(())
        }
    }

    enum MockBehavior {
        Fail,
        BadTemperature,
        Hang,
    }

    struct MockProvider(MockBehavior);

    #[async_trait]
    impl RecordProvider for MockProvider {
        fn id(&self) -> &str {
            "mock"
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::Store
        }

        async fn produce(&self, date: NaiveDate) -> Result<SubmissionRecord, RecordError> {
            match self.0 {
                MockBehavior::Fail => Err(StoreError::Unavailable("offline".to_string()).into()),
                MockBehavior::BadTemperature => {
                    let mut record = SubmissionRecord::static_defaults();
                    record.thermometry = "367".to_string();
                    Ok(record.finalize(date)?)
                }
                MockBehavior::Hang => std::future::pending().await,
            }
        }
    }

    fn credentials() -> Credentials {
        Credentials::new("parent@example.com", "hunter2")
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, 1).unwrap()
    }

    #[tokio::test]
    async fn test_successful_run() {
        let session = MockSession::default();
        let provider = StaticRecordProvider::new();
        let creds = credentials();
        let runner = SubmissionRunner::new(&session, &provider, &creds, "child-42");

        let report = runner.execute(date()).await.unwrap();

        let stages: Vec<RunStage> = report.stages.iter().map(|s| s.stage).collect();
        assert_eq!(
            stages,
            vec![RunStage::LoggedIn, RunStage::RecordReady, RunStage::Submitted]
        );
        assert_eq!(report.final_stage(), RunStage::Submitted);
        assert_eq!(report.provider_id, "static");
        assert_eq!(report.provider_kind, ProviderKind::Static);

        assert_eq!(*session.logins.lock().unwrap(), vec!["parent@example.com"]);

        let submits = session.submits.lock().unwrap();
        assert_eq!(submits.len(), 1);
        let (path, fields) = &submits[0];
        assert_eq!(path, REGIST_PATH);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].0, "save_data");
        assert_eq!(fields[1], ("child_id".to_string(), "child-42".to_string()));

        let blob: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&fields[0].1).unwrap();
        assert_eq!(blob.len(), 31);
        assert_eq!(blob["date_month"], "03");
        assert_eq!(blob["date_day"], "01");
        assert_eq!(blob["thermometry_pre"], "36");
        assert_eq!(blob["thermometry_after"], "7");
    }

    #[tokio::test]
    async fn test_login_failure_never_submits() {
        let session = MockSession {
            reject_login: true,
            ..MockSession::default()
        };
        let provider = StaticRecordProvider::new();
        let creds = credentials();
        let runner = SubmissionRunner::new(&session, &provider, &creds, "child-42");

        let err = runner.execute(date()).await.unwrap_err();

        assert!(matches!(err, RunError::Auth(_)));
        assert_eq!(err.stage(), RunStage::Init);
        assert!(session.submits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_never_submits() {
        let session = MockSession::default();
        let provider = MockProvider(MockBehavior::Fail);
        let creds = credentials();
        let runner = SubmissionRunner::new(&session, &provider, &creds, "child-42");

        let err = runner.execute(date()).await.unwrap_err();

        assert!(matches!(err, RunError::DataFetch(RecordError::Store(_))));
        assert!(session.submits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_temperature_never_submits() {
        let session = MockSession::default();
        let provider = MockProvider(MockBehavior::BadTemperature);
        let creds = credentials();
        let runner = SubmissionRunner::new(&session, &provider, &creds, "child-42");

        let err = runner.execute(date()).await.unwrap_err();

        assert!(matches!(
            err,
            RunError::DataFetch(RecordError::Core(CoreError::MalformedTemperature(_)))
        ));
        assert!(session.submits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submission_failure() {
        let session = MockSession {
            reject_submit: true,
            ..MockSession::default()
        };
        let provider = StaticRecordProvider::new();
        let creds = credentials();
        let runner = SubmissionRunner::new(&session, &provider, &creds, "child-42");

        let err = runner.execute(date()).await.unwrap_err();

        assert!(matches!(err, RunError::Submission(_)));
        assert_eq!(err.stage(), RunStage::RecordReady);
        assert_eq!(session.submits.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_login() {
        let session = MockSession {
            hang_login: true,
            ..MockSession::default()
        };
        let provider = StaticRecordProvider::new();
        let creds = credentials();
        let runner = SubmissionRunner::new(&session, &provider, &creds, "child-42");

        let err = runner
            .execute_until(date(), std::future::ready(()))
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Cancelled(CancelledAt(RunStage::Init))));
        assert!(session.logins.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_fetch() {
        let session = MockSession::default();
        let provider = MockProvider(MockBehavior::Hang);
        let creds = credentials();
        let runner = SubmissionRunner::new(&session, &provider, &creds, "child-42");

        let cancel = tokio::time::sleep(Duration::from_millis(20));
        let err = runner.execute_until(date(), cancel).await.unwrap_err();

        assert_eq!(err.stage(), RunStage::LoggedIn);
        assert_eq!(err.to_string(), "run cancelled while fetching the record");
        assert_eq!(session.logins.lock().unwrap().len(), 1);
        assert!(session.submits.lock().unwrap().is_empty());
    }
}
