//! tracebench core library
//!
//! Domain model and persistence for benchmarking an external solver:
//! - corpus discovery of test cases
//! - a pool of reusable oracle sessions and the verifier built on it
//! - per-trial result storage with atomic replacement
//! - the ratcheted best-result ledger
//! - per-test-case ranking of solver variants

pub mod corpus;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod oracle;
pub mod ranking;
pub mod store;
pub mod telemetry;

pub use corpus::{discover, titles, KindFilter};
pub use domain::{
    Energy, InfoRecord, OracleVerdict, ProblemKind, TestCase, Trial, TrialStatus, Variant,
    INVALID_ENERGY,
};
pub use error::{
    CorpusError, OracleError, ReportError, Result, StoreError, TracebenchError,
};
pub use ledger::{improvement_percent, Ledger, LedgerUpdate, SkipReason, SweepSummary};
pub use oracle::{
    parse_report, CommandOracle, CommandSession, OraclePool, OracleSession, SessionFactory,
    TraceVerifier, VerificationOutcome, Verifier,
};
pub use ranking::{
    export_records, render_html, validate_columns, write_csv, write_json, Column, ColumnKind,
    ColumnSource, EnergyMatrix, RankedCell, RankedRow, Ranking, RankingConfig, RankingEngine,
    RankingRecord, Tier,
};
pub use store::{read_info, ArtifactPaths, ResultStore, RunLayout};
pub use telemetry::{init_tracing, RunSpan};

/// tracebench version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
