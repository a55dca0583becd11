//! Tracing initialisation and structured lifecycle events.
//!
//! Call [`init_tracing`] once at program start. Library code only emits
//! through `tracing` macros and the `emit_*` helpers below.

use tracing::{info, warn, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::domain::{Energy, TrialStatus};

/// Initialise the global tracing subscriber.
///
/// Log lines go to stderr so that command output on stdout stays clean.
/// `RUST_LOG` directives override `level`; `json` switches to
/// newline-delimited JSON carrying the current span's fields. Only the
/// first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let output: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let _ = tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init();
}

/// RAII guard that keeps a run-scoped span entered.
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: &str) -> Self {
        let span = tracing::info_span!("tracebench.run", run_id = %run_id);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_trial_started(test_case: &str, variant: &str) {
    info!(event = "trial.started", test_case = %test_case, variant = %variant);
}

pub fn emit_trial_finished(test_case: &str, variant: &str, status: TrialStatus, duration_ms: u64) {
    if matches!(status, TrialStatus::Success) {
        info!(
            event = "trial.finished",
            test_case = %test_case,
            variant = %variant,
            status = %status,
            duration_ms = duration_ms,
        );
    } else {
        warn!(
            event = "trial.finished",
            test_case = %test_case,
            variant = %variant,
            status = %status,
            duration_ms = duration_ms,
        );
    }
}

pub fn emit_trial_cancelled(test_case: &str, variant: &str) {
    warn!(event = "trial.cancelled", test_case = %test_case, variant = %variant);
}

pub fn emit_ledger_promoted(test_case: &str, previous: Option<Energy>, energy: Energy, trace_digest: &str) {
    info!(
        event = "ledger.promoted",
        test_case = %test_case,
        previous = ?previous,
        energy = energy,
        trace_digest = %&trace_digest[..12.min(trace_digest.len())],
    );
}
