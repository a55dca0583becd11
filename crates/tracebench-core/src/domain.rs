//! Domain model: test cases, solver variants, trials and their info records.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TracebenchError};

/// Solver cost metric. Lower is better.
pub type Energy = u64;

/// Sentinel for an energy that is not comparable (failed or missing result).
pub const INVALID_ENERGY: Energy = Energy::MAX;

/// Problem class of a test case.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ProblemKind {
    /// Build the target model from an empty matrix.
    Assembly,
    /// Remove the source model down to an empty matrix.
    Disassembly,
    /// Turn the source model into the target model.
    Reassembly,
    /// Assembly problem from the lightning round corpus.
    LightningAssembly,
}

impl ProblemKind {
    /// Parse from the class (`L`/`F`) and kind (`A`/`D`/`R`) letters of a title.
    pub fn from_letters(class: char, kind: char) -> Option<Self> {
        match (class, kind) {
            ('L', 'A') => Some(ProblemKind::LightningAssembly),
            (_, 'A') => Some(ProblemKind::Assembly),
            (_, 'D') => Some(ProblemKind::Disassembly),
            (_, 'R') => Some(ProblemKind::Reassembly),
            _ => None,
        }
    }

    /// Filter letter used by kind filters such as `"ADR"`.
    pub fn letter(&self) -> char {
        match self {
            ProblemKind::Assembly | ProblemKind::LightningAssembly => 'A',
            ProblemKind::Disassembly => 'D',
            ProblemKind::Reassembly => 'R',
        }
    }

    pub fn needs_source(&self) -> bool {
        matches!(self, ProblemKind::Disassembly | ProblemKind::Reassembly)
    }

    pub fn needs_target(&self) -> bool {
        !matches!(self, ProblemKind::Disassembly)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProblemKind::Assembly => "assembly",
            ProblemKind::Disassembly => "disassembly",
            ProblemKind::Reassembly => "reassembly",
            ProblemKind::LightningAssembly => "lightning-assembly",
        }
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One benchmark input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Identifier, e.g. `FR042`.
    pub title: String,
    pub kind: ProblemKind,
    pub source_model: Option<PathBuf>,
    pub target_model: Option<PathBuf>,
}

/// A named solver configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Name used for output directories and ranking columns.
    pub name: String,
    /// Solver executable.
    pub binary: PathBuf,
    /// Engine selected inside the solver binary (`--engine`), if any.
    pub engine: Option<String>,
}

impl Variant {
    pub fn new(name: impl Into<String>, binary: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            binary: binary.into(),
            engine: None,
        }
    }

    /// Select an engine. The name gains an `@engine` suffix, as in
    /// [`Variant::resolve`].
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        let engine = engine.into();
        self.name = format!("{}@{}", self.name, engine);
        self.engine = Some(engine);
        self
    }

    /// Resolve a `name[@engine]` spec.
    ///
    /// The binary is `name` itself when that is an existing file, otherwise
    /// `solver_dir/name`. With an engine, the directory name becomes
    /// `name@engine` so two engines of one binary get separate outputs.
    pub fn resolve(spec: &str, solver_dir: &Path) -> Result<Self> {
        let (binary_name, engine) = match spec.split_once('@') {
            Some((b, e)) if !e.is_empty() => (b, Some(e.to_string())),
            Some((b, _)) => (b, None),
            None => (spec, None),
        };
        if binary_name.is_empty() {
            return Err(TracebenchError::InvalidConfig(format!(
                "empty variant name in '{spec}'"
            )));
        }

        let direct = PathBuf::from(binary_name);
        let binary = if direct.is_file() {
            direct
        } else {
            let joined = solver_dir.join(binary_name);
            if !joined.is_file() {
                return Err(TracebenchError::VariantNotFound(binary_name.to_string()));
            }
            joined
        };

        let stem = Path::new(binary_name)
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| binary_name.to_string());
        let name = match &engine {
            Some(e) => format!("{stem}@{e}"),
            None => stem,
        };

        Ok(Self {
            name,
            binary,
            engine,
        })
    }
}

/// Final state of one (TestCase, Variant) execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TrialStatus {
    Success,
    Failure,
    Timeout,
    VerificationMismatch,
    VerificationError,
    /// Never started because the batch was aborted. Not persisted.
    Cancelled,
}

impl TrialStatus {
    pub fn name(&self) -> &'static str {
        match self {
            TrialStatus::Success => "success",
            TrialStatus::Failure => "failure",
            TrialStatus::Timeout => "timeout",
            TrialStatus::VerificationMismatch => "verification-mismatch",
            TrialStatus::VerificationError => "verification-error",
            TrialStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome parsed from an oracle report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleVerdict {
    pub successful: bool,
    pub energy: Energy,
    pub consumed_commands: u64,
    #[serde(default)]
    pub message: String,
}

/// Persisted info/result record for one trial.
///
/// Solvers write the first three fields themselves; the rest is filled in
/// by the dispatcher before the record is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoRecord {
    pub successful: bool,
    pub energy: Energy,
    pub consumed_commands: u64,
    #[serde(default, alias = "msg")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TrialStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle: Option<OracleVerdict>,
}

impl InfoRecord {
    /// Record for a trial that produced no usable solver output.
    pub fn failed(status: TrialStatus, message: impl Into<String>) -> Self {
        Self {
            successful: false,
            energy: INVALID_ENERGY,
            consumed_commands: 0,
            message: message.into(),
            status: Some(status),
            engine_name: None,
            oracle: None,
        }
    }

    /// Whether this record counts as a successful result.
    ///
    /// Records without a status (written directly by a solver) count when
    /// `successful` is set.
    pub fn is_success(&self) -> bool {
        self.successful && matches!(self.status, None | Some(TrialStatus::Success))
    }

    /// Energy, or [`INVALID_ENERGY`] when the record is not a success.
    pub fn effective_energy(&self) -> Energy {
        if self.is_success() {
            self.energy
        } else {
            INVALID_ENERGY
        }
    }
}

/// Result of running one variant against one test case.
#[derive(Debug, Clone)]
pub struct Trial {
    pub test_case: String,
    pub variant: String,
    pub status: TrialStatus,
    pub info: Option<InfoRecord>,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl Trial {
    /// A submission that was skipped because the batch was aborted.
    pub fn cancelled(test_case: &str, variant: &str) -> Self {
        Self {
            test_case: test_case.to_string(),
            variant: variant.to_string(),
            status: TrialStatus::Cancelled,
            info: None,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
        }
    }

    pub fn energy(&self) -> Energy {
        match (&self.status, &self.info) {
            (TrialStatus::Success, Some(info)) => info.energy,
            _ => INVALID_ENERGY,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == TrialStatus::Success
    }
}
