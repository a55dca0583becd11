//! End-to-end ledger behaviour: trials stored by a run, then swept into the
//! best-result directories.

use std::fs;
use std::path::Path;

use tracebench_core::{
    InfoRecord, Ledger, LedgerUpdate, ResultStore, RunLayout, SkipReason, Trial, TrialStatus,
};

fn record(successful: bool, energy: u64) -> InfoRecord {
    InfoRecord {
        successful,
        energy,
        consumed_commands: 42,
        message: String::new(),
        status: None,
        engine_name: None,
        oracle: None,
    }
}

fn trial(title: &str, status: TrialStatus, info: Option<InfoRecord>) -> Trial {
    Trial {
        test_case: title.to_string(),
        variant: "base".to_string(),
        status,
        info,
        exit_code: Some(0),
        stdout: String::new(),
        stderr: String::new(),
        duration_ms: 5,
    }
}

/// Store one trial the way the dispatcher does: the solver wrote staged
/// outputs, the store moves them into place.
fn store_trial(store: &ResultStore, trial: &Trial, trace: &[u8]) {
    let staged = store.layout().artifacts(&trial.variant, &trial.test_case).staged();
    fs::write(&staged.trace, trace).unwrap();
    store.write(trial).unwrap();
}

fn new_run(root: &Path, name: &str) -> ResultStore {
    let layout = RunLayout::new(
        root.join(name).join("traces"),
        root.join(name).join("info"),
        root.join(name).join("energy"),
    );
    layout.prepare(["base"]).unwrap();
    ResultStore::new(layout)
}

fn sweep(ledger: &Ledger, store: &ResultStore) {
    let layout = store.layout();
    ledger
        .sweep(&layout.info_root.join("base"), &layout.trace_root.join("base"))
        .unwrap();
}

#[test]
fn test_first_run_creates_records_for_successes_only() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::new(dir.path().join("result/info"), dir.path().join("result/trace"));
    let store = new_run(dir.path(), "run1");

    let mut ok = record(true, 100);
    ok.status = Some(TrialStatus::Success);
    store_trial(&store, &trial("X", TrialStatus::Success, Some(ok)), b"x-100");
    store_trial(&store, &trial("Y", TrialStatus::Failure, None), b"partial");

    sweep(&ledger, &store);

    assert_eq!(ledger.best("X").unwrap().unwrap().energy, 100);
    assert_eq!(fs::read(ledger.trace_path("X")).unwrap(), b"x-100");
    assert!(ledger.best("Y").unwrap().is_none());
    assert!(!ledger.trace_path("Y").exists());
}

#[test]
fn test_later_runs_only_ever_lower_the_best() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::new(dir.path().join("result/info"), dir.path().join("result/trace"));

    for (run, energy) in [("run1", 100u64), ("run2", 80), ("run3", 90)] {
        let store = new_run(dir.path(), run);
        let mut info = record(true, energy);
        info.status = Some(TrialStatus::Success);
        let trace = format!("x-{energy}");
        store_trial(&store, &trial("X", TrialStatus::Success, Some(info)), trace.as_bytes());
        sweep(&ledger, &store);
    }

    assert_eq!(ledger.best("X").unwrap().unwrap().energy, 80);
    assert_eq!(fs::read(ledger.trace_path("X")).unwrap(), b"x-80");
}

#[test]
fn test_ratchet_tracks_running_minimum_in_any_order() {
    let energies = [120u64, 95, 95, 130, 60, 61, 200];
    for order in [energies.to_vec(), energies.iter().rev().copied().collect()] {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("info"), dir.path().join("trace"));
        let trace = dir.path().join("candidate.nbt");

        let mut minimum = u64::MAX;
        for energy in order {
            fs::write(&trace, energy.to_string()).unwrap();
            let update = ledger.apply("X", &record(true, energy), &trace).unwrap();
            assert_eq!(update.promoted(), energy < minimum);
            minimum = minimum.min(energy);

            let best = ledger.best("X").unwrap().unwrap();
            assert_eq!(best.energy, minimum);
            assert_eq!(fs::read_to_string(ledger.trace_path("X")).unwrap(), minimum.to_string());
        }
        assert_eq!(minimum, 60);
    }
}

#[test]
fn test_unsuccessful_candidates_never_replace_a_record() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::new(dir.path().join("info"), dir.path().join("trace"));
    let trace = dir.path().join("candidate.nbt");
    fs::write(&trace, b"good").unwrap();
    ledger.apply("X", &record(true, 100), &trace).unwrap();

    fs::write(&trace, b"bad").unwrap();
    let failed = ledger.apply("X", &record(false, 1), &trace).unwrap();
    assert_eq!(failed, LedgerUpdate::Skipped(SkipReason::NotSuccessful));

    let mut mismatch = record(true, 2);
    mismatch.status = Some(TrialStatus::VerificationMismatch);
    let update = ledger.apply("X", &mismatch, &trace).unwrap();
    assert_eq!(update, LedgerUpdate::Skipped(SkipReason::NotSuccessful));

    assert_eq!(ledger.best("X").unwrap().unwrap().energy, 100);
    assert_eq!(fs::read(ledger.trace_path("X")).unwrap(), b"good");
}

#[test]
fn test_sweep_counts_trace_without_info_as_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::new(dir.path().join("result/info"), dir.path().join("result/trace"));
    let run_info = dir.path().join("run/info");
    let run_trace = dir.path().join("run/trace");
    fs::create_dir_all(&run_info).unwrap();
    fs::create_dir_all(&run_trace).unwrap();
    fs::write(run_trace.join("X.nbt"), b"x").unwrap();
    fs::write(run_trace.join("notes.txt"), b"ignored").unwrap();

    let summary = ledger.sweep(&run_info, &run_trace).unwrap();
    assert_eq!(summary.examined, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.promoted, 0);
}
