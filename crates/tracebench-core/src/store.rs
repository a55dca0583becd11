//! Per-trial artifact storage.
//!
//! Layout per run: `<root>/<variant>/<title>.<ext>` for the trace (`.nbt`),
//! info (`.json`) and energy breakdown (`.energy.json`) roots. Every write is
//! a temp file in the destination directory followed by a rename, so a
//! concurrent reader sees either the old file or the new one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::domain::{InfoRecord, Trial, TrialStatus};
use crate::error::StoreError;

/// Suffix appended to artifact paths handed to the solver.
pub const STAGING_SUFFIX: &str = "partial";

/// Output roots for one run. Each variant writes into its own subdirectory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    pub trace_root: PathBuf,
    pub info_root: PathBuf,
    pub energy_root: PathBuf,
}

impl RunLayout {
    pub fn new(
        trace_root: impl Into<PathBuf>,
        info_root: impl Into<PathBuf>,
        energy_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            trace_root: trace_root.into(),
            info_root: info_root.into(),
            energy_root: energy_root.into(),
        }
    }

    /// Wipe and recreate the output directories of `variants`. Called once at
    /// the start of a run, never per trial.
    pub fn prepare<'a>(&self, variants: impl IntoIterator<Item = &'a str>) -> Result<(), StoreError> {
        for variant in variants {
            for root in [&self.trace_root, &self.info_root, &self.energy_root] {
                let dir = root.join(variant);
                if dir.exists() {
                    fs::remove_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
                }
                fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
                debug!(dir = %dir.display(), "prepared output directory");
            }
        }
        Ok(())
    }

    /// Final artifact paths of one trial.
    pub fn artifacts(&self, variant: &str, title: &str) -> ArtifactPaths {
        ArtifactPaths {
            trace: self.trace_root.join(variant).join(format!("{title}.nbt")),
            info: self.info_root.join(variant).join(format!("{title}.json")),
            energy: self.energy_root.join(variant).join(format!("{title}.energy.json")),
        }
    }
}

/// Artifact paths of one trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub trace: PathBuf,
    pub info: PathBuf,
    pub energy: PathBuf,
}

impl ArtifactPaths {
    /// Paths the solver writes to before the store moves them into place.
    pub fn staged(&self) -> ArtifactPaths {
        ArtifactPaths {
            trace: staged_path(&self.trace),
            info: staged_path(&self.info),
            energy: staged_path(&self.energy),
        }
    }
}

fn staged_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(STAGING_SUFFIX);
    path.with_file_name(name)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Atomically replace `path` with `data`.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    tmp.write_all(data).map_err(|e| StoreError::io(path, e))?;
    tmp.as_file().sync_all().map_err(|e| StoreError::io(path, e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

/// Atomically replace `path` with pretty-printed JSON of `value`.
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &content)
}

/// Atomically replace `dest` with a copy of `src`.
///
/// The copy goes to a temp file next to `dest` first, so `src` and `dest`
/// may live on different filesystems.
pub fn copy_atomic(src: &Path, dest: &Path) -> Result<(), StoreError> {
    let dir = parent_dir(dest);
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let mut reader = fs::File::open(src).map_err(|e| StoreError::io(src, e))?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    std::io::copy(&mut reader, tmp.as_file_mut()).map_err(|e| StoreError::io(dest, e))?;
    tmp.as_file().sync_all().map_err(|e| StoreError::io(dest, e))?;
    tmp.persist(dest).map_err(|e| StoreError::io(dest, e.error))?;
    Ok(())
}

/// Read an info record. A missing file is `Ok(None)`.
pub fn read_info(path: &Path) -> Result<Option<InfoRecord>, StoreError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|source| StoreError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

/// Writes the outcome of each finished trial.
#[derive(Debug, Clone)]
pub struct ResultStore {
    layout: RunLayout,
}

impl ResultStore {
    pub fn new(layout: RunLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    /// Persist one trial: move staged trace and energy artifacts into place
    /// and write the info record.
    ///
    /// Cancelled trials are never stored. A timed-out or failed trial still
    /// gets an info record so later ranking sees it as a failure; staged
    /// partial outputs of such trials are discarded.
    pub fn write(&self, trial: &Trial) -> Result<ArtifactPaths, StoreError> {
        let paths = self.layout.artifacts(&trial.variant, &trial.test_case);
        if trial.status == TrialStatus::Cancelled {
            return Ok(paths);
        }
        let staged = paths.staged();

        let keep_outputs = matches!(
            trial.status,
            TrialStatus::Success
                | TrialStatus::Failure
                | TrialStatus::VerificationMismatch
                | TrialStatus::VerificationError
        ) && trial.info.is_some();

        for (from, to) in [(&staged.trace, &paths.trace), (&staged.energy, &paths.energy)] {
            if !from.exists() {
                continue;
            }
            if keep_outputs {
                fs::rename(from, to).map_err(|e| StoreError::io(to, e))?;
            } else {
                fs::remove_file(from).map_err(|e| StoreError::io(from, e))?;
            }
        }
        if staged.info.exists() {
            fs::remove_file(&staged.info).map_err(|e| StoreError::io(&staged.info, e))?;
        }

        let info = match &trial.info {
            Some(info) => info.clone(),
            None => InfoRecord::failed(trial.status, diagnostic(trial)),
        };
        write_json_atomic(&paths.info, &info)?;
        debug!(
            test_case = %trial.test_case,
            variant = %trial.variant,
            status = %trial.status,
            "stored trial artifacts"
        );
        Ok(paths)
    }
}

fn diagnostic(trial: &Trial) -> String {
    let mut msg = String::new();
    if let Some(code) = trial.exit_code {
        msg.push_str(&format!("exit code {code}\n"));
    }
    msg.push_str(&trial.stdout);
    if !trial.stderr.is_empty() {
        msg.push_str(&trial.stderr);
    }
    msg
}
