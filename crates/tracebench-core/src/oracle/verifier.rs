//! Cross-checks a trial's reported outcome with an oracle session.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::{InfoRecord, OracleVerdict, TestCase, TrialStatus};

use super::{parse_report, OracleSession, OraclePool, SessionFactory};

/// Result of one verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The oracle agrees on success and energy.
    Confirmed(OracleVerdict),
    /// The oracle disagrees on success or energy.
    Mismatch(OracleVerdict),
    /// The oracle could not produce a usable verdict.
    Error(String),
}

impl VerificationOutcome {
    /// Fold this outcome into the trial's info record and return the new
    /// trial status. The primary values are kept; the oracle verdict is
    /// attached next to them.
    pub fn apply_to(self, info: &mut InfoRecord, current: TrialStatus) -> TrialStatus {
        let status = match self {
            VerificationOutcome::Confirmed(verdict) => {
                info.oracle = Some(verdict);
                current
            }
            VerificationOutcome::Mismatch(verdict) => {
                info.oracle = Some(verdict);
                TrialStatus::VerificationMismatch
            }
            VerificationOutcome::Error(reason) => {
                if !info.message.is_empty() {
                    info.message.push('\n');
                }
                info.message.push_str(&format!("verification error: {reason}"));
                TrialStatus::VerificationError
            }
        };
        info.status = Some(status);
        status
    }
}

/// Verifies traces through a shared [`OraclePool`].
pub struct Verifier<F: SessionFactory> {
    pool: Arc<OraclePool<F>>,
}

impl<F: SessionFactory> Verifier<F> {
    pub fn new(pool: Arc<OraclePool<F>>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<OraclePool<F>> {
        &self.pool
    }

    /// Run `trace` through a pooled session and compare with `primary`.
    ///
    /// The session goes back to the pool only when it produced a report. A
    /// session that failed is dropped here. A report that cannot be parsed
    /// is an error outcome; the session itself worked and is released.
    pub async fn check(
        &self,
        source: Option<&Path>,
        target: Option<&Path>,
        trace: &Path,
        primary: &InfoRecord,
    ) -> VerificationOutcome {
        let mut session = match self.pool.borrow().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "could not obtain oracle session");
                return VerificationOutcome::Error(e.to_string());
            }
        };

        let report = match session.execute(source, target, trace).await {
            Ok(report) => {
                self.pool.release(session);
                report
            }
            Err(e) => {
                warn!(error = %e, trace = %trace.display(), "oracle session failed, discarding it");
                drop(session);
                return VerificationOutcome::Error(e.to_string());
            }
        };

        let verdict = match parse_report(&report) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, trace = %trace.display(), "unparseable oracle report");
                return VerificationOutcome::Error(format!("{e}: {report}"));
            }
        };

        if verdict.successful != primary.successful || verdict.energy != primary.energy {
            warn!(
                trace = %trace.display(),
                primary_successful = primary.successful,
                primary_energy = primary.energy,
                oracle_successful = verdict.successful,
                oracle_energy = verdict.energy,
                "verification mismatch"
            );
            VerificationOutcome::Mismatch(verdict)
        } else {
            VerificationOutcome::Confirmed(verdict)
        }
    }
}

/// Object-safe view of a verifier, as held by the dispatcher.
#[async_trait]
pub trait TraceVerifier: Send + Sync {
    async fn verify(&self, test_case: &TestCase, trace: &Path, primary: &InfoRecord) -> VerificationOutcome;
}

#[async_trait]
impl<F: SessionFactory + 'static> TraceVerifier for Verifier<F> {
    async fn verify(&self, test_case: &TestCase, trace: &Path, primary: &InfoRecord) -> VerificationOutcome {
        self.check(
            test_case.source_model.as_deref(),
            test_case.target_model.as_deref(),
            trace,
            primary,
        )
        .await
    }
}
