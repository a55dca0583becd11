//! Bounded, fail-fast dispatch of solver trials.
//!
//! Every (TestCase, Variant) pair becomes one task. A semaphore bounds the
//! number of running solvers; a shared [`CancellationFlag`] is raised on
//! the first process failure when fail-fast is on. Tasks check the flag
//! after acquiring their permit, so in-flight trials finish normally and
//! only not-yet-started submissions are cancelled.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn, Instrument};

use tracebench_core::store::read_info;
use tracebench_core::telemetry::{emit_trial_cancelled, emit_trial_finished, emit_trial_started};
use tracebench_core::{
    InfoRecord, ResultStore, TestCase, TraceVerifier, Trial, TrialStatus, Variant,
};

use crate::error::{DispatchError, DispatchResult};
use crate::invocation::SolverInvocation;
use crate::process::{ProcessExecutor, ProcessOutcome, TrialExecutor};

/// Configuration for one dispatch batch.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Maximum number of solvers running at once.
    pub concurrency: usize,
    /// Wall-clock limit per trial.
    pub timeout: Duration,
    /// Stop starting new trials after the first process failure.
    pub fail_fast: bool,
    /// Cross-check completed trials with the oracle.
    pub verify: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            timeout: Duration::from_secs(600),
            fail_fast: true,
            verify: false,
        }
    }
}

impl DispatchConfig {
    pub fn new(concurrency: usize, timeout: Duration) -> DispatchResult<Self> {
        let config = Self {
            concurrency,
            timeout,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn validate(&self) -> DispatchResult<()> {
        if self.concurrency == 0 {
            return Err(DispatchError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(DispatchError::InvalidConfig(
                "timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cooperative cancellation shared by all tasks of a batch.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One trial plus whether it counts as a process failure.
#[derive(Debug, Clone)]
pub struct TrialRecord {
    pub trial: Trial,
    /// Spawn error, non-zero exit or missing solver record.
    pub fatal: bool,
}

/// Outcome of a dispatch batch, in submission order.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records: Vec<TrialRecord>,
    /// Fail-fast fired and at least one submission was cancelled.
    pub aborted: bool,
}

impl DispatchReport {
    pub fn trials(&self) -> impl Iterator<Item = &Trial> {
        self.records.iter().map(|r| &r.trial)
    }

    pub fn count(&self, status: TrialStatus) -> usize {
        self.trials().filter(|t| t.status == status).count()
    }

    pub fn cancelled(&self) -> usize {
        self.count(TrialStatus::Cancelled)
    }

    /// Trials per status name.
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for trial in self.trials() {
            *counts.entry(trial.status.name()).or_insert(0) += 1;
        }
        counts
    }

    /// Process failures, in submission order.
    pub fn failed(&self) -> Vec<&Trial> {
        self.records
            .iter()
            .filter(|r| r.fatal)
            .map(|r| &r.trial)
            .collect()
    }

    /// Whether the run should be reported as failed.
    pub fn has_failures(&self) -> bool {
        self.aborted
            || self.records.iter().any(|r| r.fatal)
            || self.count(TrialStatus::Timeout) > 0
    }

    /// Human-readable dump of every process failure.
    pub fn failure_dump(&self) -> String {
        let failed = self.failed();
        if failed.is_empty() {
            return String::new();
        }
        let mut out = String::from("FAILED MODELS:\n");
        for trial in failed {
            out.push_str(&"=".repeat(80));
            out.push('\n');
            let code = trial
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "none".to_string());
            out.push_str(&format!(
                "File: {} ({}), returncode={}\n",
                trial.test_case, trial.variant, code
            ));
            out.push_str(&trial.stdout);
            if !trial.stdout.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&trial.stderr);
            if !trial.stderr.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

/// Runs solver trials under a [`DispatchConfig`].
pub struct Dispatcher<E: TrialExecutor = ProcessExecutor> {
    config: DispatchConfig,
    executor: Arc<E>,
    cancel: CancellationFlag,
}

impl Dispatcher<ProcessExecutor> {
    pub fn new(config: DispatchConfig) -> DispatchResult<Self> {
        Self::with_executor(config, ProcessExecutor)
    }
}

impl<E: TrialExecutor> Dispatcher<E> {
    /// Build a dispatcher around a custom executor.
    pub fn with_executor(config: DispatchConfig, executor: E) -> DispatchResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            executor: Arc::new(executor),
            cancel: CancellationFlag::new(),
        })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run every variant against every test case, test-case major.
    ///
    /// Returns an error only when the result store fails, after the other
    /// trials have settled; solver failures are recorded in the report.
    #[instrument(skip_all, fields(
        test_cases = test_cases.len(),
        variants = variants.len(),
        concurrency = self.config.concurrency,
    ))]
    pub async fn run(
        &self,
        test_cases: &[TestCase],
        variants: &[Variant],
        store: Arc<ResultStore>,
        verifier: Option<Arc<dyn TraceVerifier>>,
    ) -> DispatchResult<DispatchReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let verifier = if self.config.verify { verifier } else { None };
        info!(run_id = %run_id, "dispatch started");

        let sem = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = Vec::with_capacity(test_cases.len() * variants.len());

        for test_case in test_cases {
            for variant in variants {
                let task = TrialTask {
                    test_case: test_case.clone(),
                    variant: variant.clone(),
                    timeout: self.config.timeout,
                    fail_fast: self.config.fail_fast,
                    executor: Arc::clone(&self.executor),
                    store: Arc::clone(&store),
                    verifier: verifier.clone(),
                    cancel: self.cancel.clone(),
                };
                let sem = Arc::clone(&sem);
                let span = tracing::info_span!(
                    "tracebench.trial",
                    run_id = %run_id,
                    test_case = %test_case.title,
                    variant = %variant.name,
                );
                tasks.push(tokio::spawn(
                    async move {
                        let _permit = sem.acquire_owned().await.ok();
                        task.run().await
                    }
                    .instrument(span),
                ));
            }
        }

        let mut records = Vec::with_capacity(tasks.len());
        let mut first_error = None;
        for joined in futures::future::join_all(tasks).await {
            match joined {
                Ok(Ok(record)) => records.push(record),
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(DispatchError::Join(e.to_string()));
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let aborted = records
            .iter()
            .any(|r| r.trial.status == TrialStatus::Cancelled);
        let report = DispatchReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            records,
            aborted,
        };
        info!(
            run_id = %report.run_id,
            trials = report.records.len(),
            failed = report.failed().len(),
            cancelled = report.cancelled(),
            aborted = report.aborted,
            "dispatch finished"
        );
        Ok(report)
    }
}

/// Everything one spawned trial needs.
struct TrialTask<E: TrialExecutor> {
    test_case: TestCase,
    variant: Variant,
    timeout: Duration,
    fail_fast: bool,
    executor: Arc<E>,
    store: Arc<ResultStore>,
    verifier: Option<Arc<dyn TraceVerifier>>,
    cancel: CancellationFlag,
}

impl<E: TrialExecutor> TrialTask<E> {
    async fn run(self) -> DispatchResult<TrialRecord> {
        let title = self.test_case.title.as_str();
        let name = self.variant.name.as_str();

        if self.cancel.is_cancelled() {
            emit_trial_cancelled(title, name);
            return Ok(TrialRecord {
                trial: Trial::cancelled(title, name),
                fatal: false,
            });
        }
        emit_trial_started(title, name);

        let record = match SolverInvocation::build(&self.test_case, &self.variant, self.store.layout()) {
            Ok(invocation) => {
                let outcome = self.executor.execute(&invocation, self.timeout).await;
                self.classify(&invocation, outcome).await
            }
            Err(e) => self.process_failure(None, String::new(), e.to_string(), 0),
        };

        if record.fatal && self.fail_fast && !self.cancel.is_cancelled() {
            warn!(test_case = %title, variant = %name, "process failure, cancelling remaining trials");
            self.cancel.cancel();
        }

        if let Err(e) = self.store.write(&record.trial) {
            // A broken output directory fails every remaining trial too.
            self.cancel.cancel();
            return Err(e.into());
        }
        let trial = &record.trial;
        emit_trial_finished(title, name, trial.status, trial.duration_ms);
        Ok(record)
    }

    async fn classify(
        &self,
        invocation: &SolverInvocation,
        outcome: DispatchResult<ProcessOutcome>,
    ) -> TrialRecord {
        let (stdout, stderr, duration_ms) = match outcome {
            Err(e) => return self.process_failure(None, String::new(), e.to_string(), 0),
            Ok(ProcessOutcome::TimedOut {
                stdout,
                stderr,
                duration_ms,
            }) => {
                return TrialRecord {
                    trial: self.trial(TrialStatus::Timeout, None, None, stdout, stderr, duration_ms),
                    fatal: false,
                };
            }
            Ok(ProcessOutcome::Exited {
                code,
                stdout,
                stderr,
                duration_ms,
            }) if code != 0 => {
                return self.process_failure(Some(code), stdout, stderr, duration_ms);
            }
            Ok(ProcessOutcome::Exited {
                stdout,
                stderr,
                duration_ms,
                ..
            }) => (stdout, stderr, duration_ms),
        };

        let staged = match &invocation.staged {
            Some(staged) => staged,
            None => return self.process_failure(Some(0), stdout, stderr, duration_ms),
        };
        let mut info: InfoRecord = match read_info(&staged.info) {
            Ok(Some(info)) => info,
            Ok(None) => {
                let stderr = format!("{stderr}solver exited 0 without writing an info record\n");
                return self.process_failure(Some(0), stdout, stderr, duration_ms);
            }
            Err(e) => {
                let stderr = format!("{stderr}{e}\n");
                return self.process_failure(Some(0), stdout, stderr, duration_ms);
            }
        };

        let mut status = if info.successful {
            TrialStatus::Success
        } else {
            TrialStatus::Failure
        };
        info.status = Some(status);
        if info.engine_name.is_none() {
            info.engine_name = self.variant.engine.clone();
        }

        if let Some(verifier) = &self.verifier {
            if staged.trace.exists() {
                let verdict = verifier.verify(&self.test_case, &staged.trace, &info).await;
                status = verdict.apply_to(&mut info, status);
            }
        }

        TrialRecord {
            trial: self.trial(status, Some(info), Some(0), stdout, stderr, duration_ms),
            fatal: false,
        }
    }

    fn process_failure(
        &self,
        code: Option<i32>,
        stdout: String,
        stderr: String,
        duration_ms: u64,
    ) -> TrialRecord {
        TrialRecord {
            trial: self.trial(TrialStatus::Failure, None, code, stdout, stderr, duration_ms),
            fatal: true,
        }
    }

    fn trial(
        &self,
        status: TrialStatus,
        info: Option<InfoRecord>,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        duration_ms: u64,
    ) -> Trial {
        Trial {
            test_case: self.test_case.title.clone(),
            variant: self.variant.name.clone(),
            status,
            info,
            exit_code,
            stdout,
            stderr,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tracebench_core::{OracleVerdict, ProblemKind, RunLayout, VerificationOutcome};

    /// What the stub solver does for a given test case.
    #[derive(Clone, Copy)]
    enum Behaviour {
        Succeed(u64),
        Unsuccessful,
        Crash,
        Hang,
        Silent,
    }

    struct StubExecutor {
        behaviour: Box<dyn Fn(&str) -> Behaviour + Send + Sync>,
        delay: Duration,
        running: AtomicUsize,
        peak: AtomicUsize,
        started: Mutex<Vec<String>>,
    }

    impl StubExecutor {
        fn new(delay: Duration, behaviour: impl Fn(&str) -> Behaviour + Send + Sync + 'static) -> Self {
            Self {
                behaviour: Box::new(behaviour),
                delay,
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                started: Mutex::new(Vec::new()),
            }
        }
    }

    fn write_staged(invocation: &SolverInvocation, info: &InfoRecord) {
        let staged = invocation.staged.as_ref().unwrap();
        std::fs::write(&staged.trace, b"trace").unwrap();
        std::fs::write(&staged.info, serde_json::to_vec(info).unwrap()).unwrap();
    }

    fn solver_record(successful: bool, energy: u64) -> InfoRecord {
        InfoRecord {
            successful,
            energy,
            consumed_commands: 10,
            message: String::new(),
            status: None,
            engine_name: None,
            oracle: None,
        }
    }

    #[async_trait]
    impl TrialExecutor for Arc<StubExecutor> {
        async fn execute(
            &self,
            invocation: &SolverInvocation,
            timeout: Duration,
        ) -> DispatchResult<ProcessOutcome> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.started.lock().unwrap().push(invocation.test_case.clone());

            let behaviour = (self.behaviour)(&invocation.test_case);
            let outcome = match behaviour {
                Behaviour::Hang => {
                    tokio::time::sleep(timeout).await;
                    ProcessOutcome::TimedOut {
                        stdout: String::new(),
                        stderr: String::new(),
                        duration_ms: timeout.as_millis() as u64,
                    }
                }
                other => {
                    tokio::time::sleep(self.delay).await;
                    let code = match other {
                        Behaviour::Succeed(energy) => {
                            write_staged(invocation, &solver_record(true, energy));
                            0
                        }
                        Behaviour::Unsuccessful => {
                            write_staged(invocation, &solver_record(false, u64::MAX));
                            0
                        }
                        Behaviour::Silent => 0,
                        _ => 4,
                    };
                    ProcessOutcome::Exited {
                        code,
                        stdout: String::new(),
                        stderr: if code == 0 { String::new() } else { "boom".to_string() },
                        duration_ms: self.delay.as_millis() as u64,
                    }
                }
            };
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(outcome)
        }
    }

    fn cases(n: usize) -> Vec<TestCase> {
        (1..=n)
            .map(|i| TestCase {
                title: format!("FA{i:03}"),
                kind: ProblemKind::Assembly,
                source_model: None,
                target_model: Some(PathBuf::from(format!("/corpus/FA{i:03}_tgt.mdl"))),
            })
            .collect()
    }

    fn store(root: &Path, variants: &[Variant]) -> Arc<ResultStore> {
        let layout = RunLayout::new(root.join("traces"), root.join("info"), root.join("energy"));
        layout.prepare(variants.iter().map(|v| v.name.as_str())).unwrap();
        Arc::new(ResultStore::new(layout))
    }

    fn variant() -> Variant {
        Variant::new("stub", "/solvers/stub")
    }

    fn config(concurrency: usize) -> DispatchConfig {
        DispatchConfig::new(concurrency, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(DispatchConfig::new(0, Duration::from_secs(1)).is_err());
        assert!(DispatchConfig::new(1, Duration::ZERO).is_err());
        let config = DispatchConfig::default();
        assert!(config.fail_fast);
        assert!(!config.verify);
    }

    #[tokio::test]
    async fn test_single_worker_runs_sequentially() {
        let dir = tempfile::tempdir().unwrap();
        let variants = vec![variant()];
        let stub = Arc::new(StubExecutor::new(Duration::from_millis(10), |_| Behaviour::Succeed(100)));
        let dispatcher = Dispatcher::with_executor(config(1), Arc::clone(&stub)).unwrap();

        let report = dispatcher
            .run(&cases(5), &variants, store(dir.path(), &variants), None)
            .await
            .unwrap();

        assert_eq!(stub.peak.load(Ordering::SeqCst), 1);
        assert_eq!(report.count(TrialStatus::Success), 5);
        let started = stub.started.lock().unwrap().clone();
        assert_eq!(started, vec!["FA001", "FA002", "FA003", "FA004", "FA005"]);
        assert!(!report.has_failures());
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_bound() {
        let dir = tempfile::tempdir().unwrap();
        let variants = vec![variant()];
        let stub = Arc::new(StubExecutor::new(Duration::from_millis(30), |_| Behaviour::Succeed(100)));
        let dispatcher = Dispatcher::with_executor(config(4), Arc::clone(&stub)).unwrap();

        let report = dispatcher
            .run(&cases(10), &variants, store(dir.path(), &variants), None)
            .await
            .unwrap();

        let peak = stub.peak.load(Ordering::SeqCst);
        assert!(peak <= 4, "peak concurrency {peak}");
        assert!(peak >= 2, "expected parallel execution, peak {peak}");
        assert_eq!(report.records.len(), 10);
        assert_eq!(report.count(TrialStatus::Success), 10);
    }

    #[tokio::test]
    async fn test_results_are_stored_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let variants = vec![variant(), Variant::new("other", "/solvers/other").with_engine("bbox")];
        let stub = Arc::new(StubExecutor::new(Duration::from_millis(1), |_| Behaviour::Succeed(42)));
        let dispatcher = Dispatcher::with_executor(config(2), Arc::clone(&stub)).unwrap();
        let store = store(dir.path(), &variants);

        let report = dispatcher
            .run(&cases(2), &variants, Arc::clone(&store), None)
            .await
            .unwrap();

        let order: Vec<(String, String)> = report
            .trials()
            .map(|t| (t.test_case.clone(), t.variant.clone()))
            .collect();
        assert_eq!(order[0], ("FA001".to_string(), "stub".to_string()));
        assert_eq!(order[1], ("FA001".to_string(), "other@bbox".to_string()));
        assert_eq!(order[3], ("FA002".to_string(), "other@bbox".to_string()));

        let paths = store.layout().artifacts("other@bbox", "FA002");
        let info = read_info(&paths.info).unwrap().unwrap();
        assert_eq!(info.energy, 42);
        assert_eq!(info.status, Some(TrialStatus::Success));
        assert_eq!(info.engine_name.as_deref(), Some("bbox"));
        assert!(paths.trace.exists());
        assert!(!paths.staged().trace.exists());
    }

    #[tokio::test]
    async fn test_fail_fast_cancels_pending_submissions() {
        let dir = tempfile::tempdir().unwrap();
        let variants = vec![variant()];
        let stub = Arc::new(StubExecutor::new(Duration::from_millis(20), |title| {
            if title == "FA002" {
                Behaviour::Crash
            } else {
                Behaviour::Succeed(100)
            }
        }));
        let dispatcher = Dispatcher::with_executor(config(1), Arc::clone(&stub)).unwrap();
        let store = store(dir.path(), &variants);

        let report = dispatcher
            .run(&cases(6), &variants, Arc::clone(&store), None)
            .await
            .unwrap();

        assert!(report.aborted);
        assert!(report.has_failures());
        assert_eq!(report.failed().len(), 1);
        assert_eq!(report.failed()[0].test_case, "FA002");
        assert_eq!(report.count(TrialStatus::Success), 1);
        assert_eq!(report.cancelled(), 4);
        assert_eq!(stub.started.lock().unwrap().len(), 2);
        assert!(report.failure_dump().contains("returncode=4"));

        // Cancelled trials leave nothing behind.
        let paths = store.layout().artifacts("stub", "FA006");
        assert!(!paths.info.exists());
    }

    #[tokio::test]
    async fn test_keep_going_runs_everything() {
        let dir = tempfile::tempdir().unwrap();
        let variants = vec![variant()];
        let stub = Arc::new(StubExecutor::new(Duration::from_millis(5), |title| {
            if title == "FA002" {
                Behaviour::Crash
            } else {
                Behaviour::Succeed(100)
            }
        }));
        let dispatcher =
            Dispatcher::with_executor(config(2).with_fail_fast(false), Arc::clone(&stub)).unwrap();

        let report = dispatcher
            .run(&cases(5), &variants, store(dir.path(), &variants), None)
            .await
            .unwrap();

        assert!(!report.aborted);
        assert_eq!(report.cancelled(), 0);
        assert_eq!(report.count(TrialStatus::Success), 4);
        assert_eq!(report.failed().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let variants = vec![variant()];
        let stub = Arc::new(StubExecutor::new(Duration::from_millis(5), |title| {
            if title == "FA001" {
                Behaviour::Hang
            } else {
                Behaviour::Succeed(7)
            }
        }));
        let config = DispatchConfig::new(2, Duration::from_millis(100)).unwrap();
        let dispatcher = Dispatcher::with_executor(config, Arc::clone(&stub)).unwrap();
        let store = store(dir.path(), &variants);

        let report = dispatcher
            .run(&cases(3), &variants, Arc::clone(&store), None)
            .await
            .unwrap();

        assert_eq!(report.count(TrialStatus::Timeout), 1);
        assert_eq!(report.count(TrialStatus::Success), 2);
        assert_eq!(report.cancelled(), 0);
        assert!(report.failed().is_empty());

        let info = read_info(&store.layout().artifacts("stub", "FA001").info)
            .unwrap()
            .unwrap();
        assert!(!info.successful);
        assert_eq!(info.status, Some(TrialStatus::Timeout));
    }

    #[tokio::test]
    async fn test_unsuccessful_record_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let variants = vec![variant()];
        let stub = Arc::new(StubExecutor::new(Duration::from_millis(1), |title| {
            if title == "FA001" {
                Behaviour::Unsuccessful
            } else {
                Behaviour::Succeed(1)
            }
        }));
        let dispatcher = Dispatcher::with_executor(config(1), Arc::clone(&stub)).unwrap();

        let report = dispatcher
            .run(&cases(3), &variants, store(dir.path(), &variants), None)
            .await
            .unwrap();

        assert_eq!(report.count(TrialStatus::Failure), 1);
        assert!(report.failed().is_empty());
        assert!(!report.aborted);
    }

    #[tokio::test]
    async fn test_missing_info_record_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let variants = vec![variant()];
        let stub = Arc::new(StubExecutor::new(Duration::from_millis(1), |_| Behaviour::Silent));
        let dispatcher = Dispatcher::with_executor(config(1), Arc::clone(&stub)).unwrap();

        let report = dispatcher
            .run(&cases(3), &variants, store(dir.path(), &variants), None)
            .await
            .unwrap();

        assert_eq!(report.failed().len(), 1);
        assert_eq!(report.cancelled(), 2);
    }

    struct FixedVerifier(VerificationOutcome);

    #[async_trait]
    impl TraceVerifier for FixedVerifier {
        async fn verify(&self, _: &TestCase, trace: &Path, _: &InfoRecord) -> VerificationOutcome {
            assert!(trace.exists());
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn test_verification_mismatch_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let variants = vec![variant()];
        let stub = Arc::new(StubExecutor::new(Duration::from_millis(1), |_| Behaviour::Succeed(100)));
        let dispatcher =
            Dispatcher::with_executor(config(1).with_verify(true), Arc::clone(&stub)).unwrap();
        let store = store(dir.path(), &variants);
        let verdict = OracleVerdict {
            successful: true,
            energy: 90,
            consumed_commands: 10,
            message: "Success".to_string(),
        };
        let verifier: Arc<dyn TraceVerifier> =
            Arc::new(FixedVerifier(VerificationOutcome::Mismatch(verdict.clone())));

        let report = dispatcher
            .run(&cases(2), &variants, Arc::clone(&store), Some(verifier))
            .await
            .unwrap();

        assert_eq!(report.count(TrialStatus::VerificationMismatch), 2);
        assert!(report.failed().is_empty());
        let info = read_info(&store.layout().artifacts("stub", "FA001").info)
            .unwrap()
            .unwrap();
        assert_eq!(info.energy, 100);
        assert_eq!(info.oracle, Some(verdict));
        assert!(!info.is_success());
    }

    #[tokio::test]
    async fn test_verifier_ignored_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let variants = vec![variant()];
        let stub = Arc::new(StubExecutor::new(Duration::from_millis(1), |_| Behaviour::Succeed(5)));
        let dispatcher = Dispatcher::with_executor(config(1), Arc::clone(&stub)).unwrap();
        let verifier: Arc<dyn TraceVerifier> = Arc::new(FixedVerifier(
            VerificationOutcome::Error("should not run".to_string()),
        ));

        let report = dispatcher
            .run(&cases(1), &variants, store(dir.path(), &variants), Some(verifier))
            .await
            .unwrap();

        assert_eq!(report.count(TrialStatus::Success), 1);
    }
}
