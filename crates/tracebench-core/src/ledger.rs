//! Best-result ledger.
//!
//! Holds one canonical info record and trace per test case under
//! `<result_info_dir>/<title>.json` and `<result_trace_dir>/<title>.nbt`.
//! A stored energy only ever goes down: a record is replaced only by a
//! successful result with strictly lower energy.
//!
//! One sweep per corpus at a time. Each file replacement is a rename, so
//! concurrent readers never see a half-written record; info and trace are
//! replaced one after the other, not as a single transaction.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::domain::{Energy, InfoRecord};
use crate::error::StoreError;
use crate::store::{copy_atomic, read_info, write_json_atomic};
use crate::telemetry::emit_ledger_promoted;

/// Why a candidate left the ledger unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The candidate trial did not succeed.
    NotSuccessful,
    /// The stored record is at least as good.
    NotBetter { best: Energy },
    /// No info record accompanies the candidate trace.
    MissingInfo,
}

/// Outcome of applying one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerUpdate {
    Skipped(SkipReason),
    Promoted {
        previous: Option<Energy>,
        energy: Energy,
        trace_digest: String,
    },
}

impl LedgerUpdate {
    pub fn promoted(&self) -> bool {
        matches!(self, LedgerUpdate::Promoted { .. })
    }
}

/// Counts from one [`Ledger::sweep`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub examined: usize,
    pub promoted: usize,
    pub skipped: usize,
}

/// Relative size of the new energy against the old one, in percent.
pub fn improvement_percent(previous: Energy, energy: Energy) -> Option<f64> {
    if previous == 0 {
        None
    } else {
        Some(100.0 * energy as f64 / previous as f64)
    }
}

/// The persisted best-record store.
#[derive(Debug, Clone)]
pub struct Ledger {
    info_dir: PathBuf,
    trace_dir: PathBuf,
}

impl Ledger {
    pub fn new(info_dir: impl Into<PathBuf>, trace_dir: impl Into<PathBuf>) -> Self {
        Self {
            info_dir: info_dir.into(),
            trace_dir: trace_dir.into(),
        }
    }

    pub fn info_path(&self, title: &str) -> PathBuf {
        self.info_dir.join(format!("{title}.json"))
    }

    pub fn trace_path(&self, title: &str) -> PathBuf {
        self.trace_dir.join(format!("{title}.nbt"))
    }

    /// Current best record for `title`. `None` before the first success.
    pub fn best(&self, title: &str) -> Result<Option<InfoRecord>, StoreError> {
        read_info(&self.info_path(title))
    }

    /// Apply one candidate result for `title` whose trace lives at `trace`.
    pub fn apply(
        &self,
        title: &str,
        candidate: &InfoRecord,
        trace: &Path,
    ) -> Result<LedgerUpdate, StoreError> {
        if !candidate.is_success() {
            return Ok(LedgerUpdate::Skipped(SkipReason::NotSuccessful));
        }

        let previous = self.best(title)?.map(|r| r.energy);
        if let Some(best) = previous {
            if candidate.energy >= best {
                return Ok(LedgerUpdate::Skipped(SkipReason::NotBetter { best }));
            }
        }

        let trace_bytes = fs::read(trace).map_err(|e| StoreError::io(trace, e))?;
        let trace_digest = hex::encode(Sha256::digest(&trace_bytes));

        // Trace first: a failed copy leaves the old record in charge, so a
        // retry of the same candidate is still an improvement.
        copy_atomic(trace, &self.trace_path(title))?;
        write_json_atomic(&self.info_path(title), candidate)?;

        match previous {
            Some(old) => info!(
                "{} {} > {} ({:.2}%)",
                title,
                old,
                candidate.energy,
                improvement_percent(old, candidate.energy).unwrap_or(0.0)
            ),
            None => info!("{} new record {}", title, candidate.energy),
        }
        emit_ledger_promoted(title, previous, candidate.energy, &trace_digest);

        Ok(LedgerUpdate::Promoted {
            previous,
            energy: candidate.energy,
            trace_digest,
        })
    }

    /// Apply every `<title>.nbt` in `run_trace_dir`, in title order, using
    /// the matching `<title>.json` from `run_info_dir`.
    pub fn sweep(&self, run_info_dir: &Path, run_trace_dir: &Path) -> Result<SweepSummary, StoreError> {
        let mut titles = Vec::new();
        for entry in fs::read_dir(run_trace_dir).map_err(|e| StoreError::io(run_trace_dir, e))? {
            let path = entry.map_err(|e| StoreError::io(run_trace_dir, e))?.path();
            if path.extension().map(|e| e == "nbt").unwrap_or(false) {
                if let Some(stem) = path.file_stem() {
                    titles.push(stem.to_string_lossy().to_string());
                }
            }
        }
        titles.sort();

        let mut summary = SweepSummary::default();
        for title in titles {
            summary.examined += 1;
            let info_path = run_info_dir.join(format!("{title}.json"));
            let update = match read_info(&info_path)? {
                Some(candidate) => {
                    let trace = run_trace_dir.join(format!("{title}.nbt"));
                    self.apply(&title, &candidate, &trace)?
                }
                None => {
                    warn!(test_case = %title, "trace without info record, skipping");
                    LedgerUpdate::Skipped(SkipReason::MissingInfo)
                }
            };
            if update.promoted() {
                summary.promoted += 1;
            } else {
                summary.skipped += 1;
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TrialStatus;

    fn record(successful: bool, energy: Energy) -> InfoRecord {
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

    fn setup() -> (tempfile::TempDir, Ledger, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("result/info"), dir.path().join("result/trace"));
        let trace = dir.path().join("candidate.nbt");
        fs::write(&trace, b"\xff").unwrap();
        (dir, ledger, trace)
    }

    #[test]
    fn test_first_success_creates_record() {
        let (_dir, ledger, trace) = setup();
        let update = ledger.apply("FA001", &record(true, 100), &trace).unwrap();
        match update {
            LedgerUpdate::Promoted { previous, energy, trace_digest } => {
                assert_eq!(previous, None);
                assert_eq!(energy, 100);
                assert_eq!(trace_digest.len(), 64);
            }
            other => panic!("expected promotion, got {other:?}"),
        }
        assert_eq!(ledger.best("FA001").unwrap().unwrap().energy, 100);
        assert_eq!(fs::read(ledger.trace_path("FA001")).unwrap(), b"\xff");
    }

    #[test]
    fn test_equal_energy_is_not_an_improvement() {
        let (_dir, ledger, trace) = setup();
        ledger.apply("FA001", &record(true, 100), &trace).unwrap();
        let update = ledger.apply("FA001", &record(true, 100), &trace).unwrap();
        assert_eq!(update, LedgerUpdate::Skipped(SkipReason::NotBetter { best: 100 }));
    }

    #[test]
    fn test_failed_candidate_never_touches_record() {
        let (_dir, ledger, trace) = setup();
        ledger.apply("FA001", &record(true, 100), &trace).unwrap();

        let update = ledger.apply("FA001", &record(false, 1), &trace).unwrap();
        assert_eq!(update, LedgerUpdate::Skipped(SkipReason::NotSuccessful));

        let mut mismatch = record(true, 1);
        mismatch.status = Some(TrialStatus::VerificationMismatch);
        let update = ledger.apply("FA001", &mismatch, &trace).unwrap();
        assert_eq!(update, LedgerUpdate::Skipped(SkipReason::NotSuccessful));

        assert_eq!(ledger.best("FA001").unwrap().unwrap().energy, 100);
    }

    #[test]
    fn test_failed_trace_copy_keeps_previous_record_and_allows_retry() {
        let (dir, ledger, trace) = setup();
        fs::write(&trace, b"trace-100").unwrap();
        ledger.apply("FA001", &record(true, 100), &trace).unwrap();

        // A regular file where the trace directory should be.
        let trace_dir = dir.path().join("result/trace");
        fs::remove_dir_all(&trace_dir).unwrap();
        fs::write(&trace_dir, b"not a directory").unwrap();

        fs::write(&trace, b"trace-80").unwrap();
        assert!(ledger.apply("FA001", &record(true, 80), &trace).is_err());
        assert_eq!(ledger.best("FA001").unwrap().unwrap().energy, 100);

        fs::remove_file(&trace_dir).unwrap();
        let retry = ledger.apply("FA001", &record(true, 80), &trace).unwrap();
        assert!(matches!(retry, LedgerUpdate::Promoted { previous: Some(100), energy: 80, .. }));
        assert_eq!(ledger.best("FA001").unwrap().unwrap().energy, 80);
        assert_eq!(fs::read(ledger.trace_path("FA001")).unwrap(), b"trace-80");
    }

    #[test]
    fn test_improvement_percent() {
        assert_eq!(improvement_percent(100, 80), Some(80.0));
        assert_eq!(improvement_percent(0, 0), None);
    }

    #[test]
    fn test_sweep_skips_traces_without_info() {
        let (dir, ledger, _trace) = setup();
        let run_info = dir.path().join("run/info");
        let run_trace = dir.path().join("run/trace");
        fs::create_dir_all(&run_info).unwrap();
        fs::create_dir_all(&run_trace).unwrap();

        fs::write(run_trace.join("FA001.nbt"), b"a").unwrap();
        write_json_atomic(&run_info.join("FA001.json"), &record(true, 50)).unwrap();
        fs::write(run_trace.join("FA002.nbt"), b"b").unwrap();
        fs::write(run_trace.join("notes.txt"), b"ignored").unwrap();

        let summary = ledger.sweep(&run_info, &run_trace).unwrap();
        assert_eq!(
            summary,
            SweepSummary {
                examined: 2,
                promoted: 1,
                skipped: 1
            }
        );
        assert!(ledger.best("FA002").unwrap().is_none());
    }
}
