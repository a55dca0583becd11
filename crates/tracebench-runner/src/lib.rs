//! tracebench runner
//!
//! Builds solver command lines, runs solvers under a hard deadline and
//! dispatches a batch of trials with bounded concurrency and fail-fast
//! cancellation.

pub mod dispatch;
pub mod error;
pub mod invocation;
pub mod process;

pub use dispatch::{CancellationFlag, DispatchConfig, DispatchReport, Dispatcher, TrialRecord};
pub use error::{DispatchError, DispatchResult};
pub use invocation::SolverInvocation;
pub use process::{run_with_deadline, ProcessExecutor, ProcessOutcome, TrialExecutor};
