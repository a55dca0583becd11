//! Oracle backed by an external verifier program.
//!
//! The program is invoked as
//! `<program> [args..] [--src-model SRC] [--model TGT] --trace TRACE`
//! and must print its text report on stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

use crate::error::OracleError;

use super::{OracleSession, SessionFactory};

/// Factory for [`CommandSession`]s.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandOracle {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Limit a single verification. An expired limit is a session failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn program_exists(&self) -> bool {
        if self.program.components().count() > 1 {
            return self.program.is_file();
        }
        // Bare names are looked up on PATH.
        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(&self.program).is_file()))
            .unwrap_or(false)
            || self.program.is_file()
    }
}

#[async_trait]
impl SessionFactory for CommandOracle {
    type Session = CommandSession;

    async fn create(&self) -> Result<CommandSession, OracleError> {
        if !self.program_exists() {
            return Err(OracleError::ProgramNotFound(self.program.clone()));
        }
        let scratch = TempDir::new().map_err(OracleError::Launch)?;
        debug!(program = %self.program.display(), scratch = %scratch.path().display(), "new oracle session");
        Ok(CommandSession {
            oracle: self.clone(),
            scratch,
            executions: 0,
        })
    }
}

/// One oracle session: a private scratch directory the program runs in.
#[derive(Debug)]
pub struct CommandSession {
    oracle: CommandOracle,
    scratch: TempDir,
    executions: u64,
}

impl CommandSession {
    pub fn executions(&self) -> u64 {
        self.executions
    }
}

#[async_trait]
impl OracleSession for CommandSession {
    async fn execute(
        &mut self,
        source: Option<&Path>,
        target: Option<&Path>,
        trace: &Path,
    ) -> Result<String, OracleError> {
        if source.is_none() && target.is_none() {
            return Err(OracleError::NoModel);
        }

        let mut cmd = Command::new(&self.oracle.program);
        cmd.args(&self.oracle.args);
        if let Some(src) = source {
            cmd.arg("--src-model").arg(src);
        }
        if let Some(tgt) = target {
            cmd.arg("--model").arg(tgt);
        }
        cmd.arg("--trace")
            .arg(trace)
            .current_dir(self.scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(OracleError::Launch)?;
        let output = match self.oracle.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| OracleError::Session(format!("timed out after {}s", limit.as_secs())))?,
            None => child.wait_with_output().await,
        }
        .map_err(OracleError::Launch)?;
        self.executions += 1;

        if !output.status.success() {
            return Err(OracleError::Exited {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
