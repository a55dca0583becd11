use thiserror::Error;
use tracebench_core::StoreError;

/// Errors raised while dispatching solver trials.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid dispatch config: {0}")]
    InvalidConfig(String),

    #[error("cannot build invocation for {test_case}: {reason}")]
    InvalidInvocation { test_case: String, reason: String },

    #[error("invocation for {0} has an empty command")]
    EmptyCommand(String),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while waiting for solver: {0}")]
    Io(#[from] std::io::Error),

    #[error("result store failure: {0}")]
    Store(#[from] StoreError),

    #[error("trial task panicked: {0}")]
    Join(String),
}

pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
