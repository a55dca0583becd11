//! Error taxonomy for tracebench.

use std::path::PathBuf;

/// Errors produced while discovering test cases in a corpus directory.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("corpus directory not found: {0}")]
    NotADirectory(PathBuf),

    #[error("test case {title} ({kind}) is missing its {role} model: {path}")]
    MissingModel {
        title: String,
        kind: String,
        role: &'static str,
        path: PathBuf,
    },

    #[error("unknown problem kind letter '{0}' (expected A, D or R)")]
    UnknownKind(char),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by an oracle session or its factory.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle program not found: {0}")]
    ProgramNotFound(PathBuf),

    #[error("failed to launch oracle: {0}")]
    Launch(#[source] std::io::Error),

    #[error("oracle exited with code {code}: {stderr}")]
    Exited { code: i32, stderr: String },

    #[error("oracle needs at least one of source or target model")]
    NoModel,

    #[error("oracle session failed: {0}")]
    Session(String),
}

/// Errors raised while parsing an oracle text report.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("report has no Commands/Energy fields")]
    MissingFields,

    #[error("report field {field} is not an integer: {value}")]
    BadInteger { field: &'static str, value: String },
}

/// Errors raised by the result store and the ledger.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed info record {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration errors: variant resolution and ranking columns.
#[derive(Debug, thiserror::Error)]
pub enum TracebenchError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("variant binary not found: {0}")]
    VariantNotFound(String),
}

/// Result type for tracebench operations.
pub type Result<T> = std::result::Result<T, TracebenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_names_role_and_path() {
        let err = CorpusError::MissingModel {
            title: "FR001".to_string(),
            kind: "reassembly".to_string(),
            role: "source",
            path: PathBuf::from("/corpus/FR001_src.mdl"),
        };
        let msg = err.to_string();
        assert!(msg.contains("FR001"));
        assert!(msg.contains("source"));
        assert!(msg.contains("FR001_src.mdl"));
    }

    #[test]
    fn test_store_io_error_names_path() {
        let err = StoreError::io(
            "/tmp/x.json",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        );
        assert!(err.to_string().contains("/tmp/x.json"));
        assert!(err.to_string().contains("disk full"));
    }
}
