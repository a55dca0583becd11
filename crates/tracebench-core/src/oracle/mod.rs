//! Secondary verification through an external oracle.
//!
//! # Modules
//!
//! - [`pool`]    : `OraclePool`, `SessionFactory`
//! - [`command`] : `CommandOracle`: oracle backed by an external program
//! - [`report`]  : `parse_report()` for the oracle's text report
//! - [`verifier`]: `Verifier`: cross-checks a trial against the oracle

pub mod command;
pub mod pool;
pub mod report;
pub mod verifier;

use std::path::Path;

use async_trait::async_trait;

use crate::error::OracleError;

pub use command::{CommandOracle, CommandSession};
pub use pool::{OraclePool, SessionFactory};
pub use report::parse_report;
pub use verifier::{TraceVerifier, VerificationOutcome, Verifier};

/// A stateful verifier handle. Used by one borrower at a time.
#[async_trait]
pub trait OracleSession: Send + 'static {
    /// Execute `trace` against the given models and return the text report.
    async fn execute(
        &mut self,
        source: Option<&Path>,
        target: Option<&Path>,
        trace: &Path,
    ) -> Result<String, OracleError>;
}
