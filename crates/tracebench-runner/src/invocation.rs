//! Solver command lines.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracebench_core::{ArtifactPaths, ProblemKind, RunLayout, TestCase, Variant};

use crate::error::DispatchError;

/// A fully built solver invocation for one (TestCase, Variant) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverInvocation {
    pub test_case: String,
    pub variant: String,

    /// Command to execute (first element is the executable).
    pub command: Vec<String>,

    /// Working directory: the solver binary's directory.
    pub cwd: Option<PathBuf>,

    /// Paths the solver writes to; moved into place after the run.
    #[serde(skip)]
    pub staged: Option<ArtifactPaths>,
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

impl SolverInvocation {
    /// Build the command line from the test case's problem kind:
    ///
    /// - assembly: `--model TGT`
    /// - disassembly: `--src-model SRC`
    /// - reassembly: `--model TGT --src-model SRC`
    ///
    /// followed by the staged output paths and `--engine` when the variant
    /// selects one.
    pub fn build(
        test_case: &TestCase,
        variant: &Variant,
        layout: &RunLayout,
    ) -> Result<Self, DispatchError> {
        let missing = |role: &str| DispatchError::InvalidInvocation {
            test_case: test_case.title.clone(),
            reason: format!("{} problem without {role} model", test_case.kind),
        };

        let binary = absolute(&variant.binary);
        let mut command = vec![path_arg(&binary)];

        match test_case.kind {
            ProblemKind::Assembly | ProblemKind::LightningAssembly => {
                let tgt = test_case.target_model.as_deref().ok_or_else(|| missing("target"))?;
                command.extend(["--model".to_string(), path_arg(&absolute(tgt))]);
            }
            ProblemKind::Disassembly => {
                let src = test_case.source_model.as_deref().ok_or_else(|| missing("source"))?;
                command.extend(["--src-model".to_string(), path_arg(&absolute(src))]);
            }
            ProblemKind::Reassembly => {
                let tgt = test_case.target_model.as_deref().ok_or_else(|| missing("target"))?;
                let src = test_case.source_model.as_deref().ok_or_else(|| missing("source"))?;
                command.extend([
                    "--model".to_string(),
                    path_arg(&absolute(tgt)),
                    "--src-model".to_string(),
                    path_arg(&absolute(src)),
                ]);
            }
        }

        let staged = layout.artifacts(&variant.name, &test_case.title).staged();
        command.extend([
            "--trace-output".to_string(),
            path_arg(&absolute(&staged.trace)),
            "--info".to_string(),
            path_arg(&absolute(&staged.info)),
            "--energy".to_string(),
            path_arg(&absolute(&staged.energy)),
        ]);
        if let Some(engine) = &variant.engine {
            command.extend(["--engine".to_string(), engine.clone()]);
        }

        let cwd = binary
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf);

        Ok(Self {
            test_case: test_case.title.clone(),
            variant: variant.name.clone(),
            command,
            cwd,
            staged: Some(staged),
        })
    }

    /// Ad-hoc invocation, mainly for tests.
    pub fn custom(test_case: &str, variant: &str, command: Vec<String>) -> Self {
        Self {
            test_case: test_case.to_string(),
            variant: variant.to_string(),
            command,
            cwd: None,
            staged: None,
        }
    }
}
