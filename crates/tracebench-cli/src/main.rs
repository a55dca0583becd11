//! tracebench - solver benchmark orchestration CLI
//!
//! ## Commands
//!
//! - `run`: run solver variants over a model corpus
//! - `update`: promote improved results of a run into the best-result ledger
//! - `compare`: rank variants per model against the baselines
//! - `verify`: check a single trace with the external verifier

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn, Level};

use tracebench_core::store::write_json_atomic;
use tracebench_core::{
    discover, parse_report, render_html, titles, validate_columns, write_csv, write_json, Column,
    ColumnSource, CommandOracle, EnergyMatrix, InfoRecord, KindFilter, Ledger, OraclePool,
    OracleSession, RankingConfig, RankingEngine, ResultStore, RunLayout, RunSpan, SessionFactory,
    TraceVerifier, Variant, Verifier,
};
use tracebench_runner::{DispatchConfig, DispatchReport, Dispatcher};

#[derive(Parser)]
#[command(name = "tracebench")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Benchmark solver variants and keep the best results", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run solver variants over every model in a corpus
    Run(RunArgs),

    /// Promote improved results of a run into the result directories
    Update {
        /// Directory containing traces of the run
        #[arg(long)]
        run_trace_dir: PathBuf,

        /// Directory containing info records of the run
        #[arg(long)]
        run_info_dir: PathBuf,

        /// Directory holding the current best traces
        #[arg(long)]
        result_trace_dir: PathBuf,

        /// Directory holding the current best info records
        #[arg(long)]
        result_info_dir: PathBuf,
    },

    /// Rank variants per model and write an HTML table
    Compare {
        /// Directory containing the model files
        #[arg(long, env = "TRACEBENCH_CORPUS")]
        corpus: PathBuf,

        /// Info records of the default traces
        #[arg(long)]
        default_info_dir: PathBuf,

        /// Info records of hand-written traces
        #[arg(long)]
        hand_info_dir: Option<PathBuf>,

        /// Parent directory of the per-variant info directories
        #[arg(long, default_value = "tmp-quick-info")]
        info_dir_base: PathBuf,

        /// Space-separated variant names, e.g. "solver solver@bbox"
        #[arg(long)]
        variants: String,

        /// Output HTML file
        #[arg(long)]
        html: PathBuf,

        /// Also write a CSV export
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Also write a JSON export
        #[arg(long = "json-out")]
        json_out: Option<PathBuf>,
    },

    /// Execute one trace with the verifier and print its report
    Verify {
        /// Source model
        #[arg(long)]
        src_model: Option<PathBuf>,

        /// Target model
        #[arg(long)]
        model: Option<PathBuf>,

        /// Trace to execute
        #[arg(long)]
        trace: PathBuf,

        /// Verifier program
        #[arg(long, env = "TRACEBENCH_ORACLE")]
        oracle: PathBuf,

        /// Extra argument passed to the verifier (repeatable)
        #[arg(long = "oracle-arg")]
        oracle_args: Vec<String>,

        /// Write the parsed result as an info record
        #[arg(long)]
        info: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Directory containing the model files
    #[arg(long, env = "TRACEBENCH_CORPUS")]
    corpus: PathBuf,

    /// Space-separated variants: `name` or `name@engine`
    #[arg(long)]
    variants: String,

    /// Directory searched for variant binaries
    #[arg(long, env = "TRACEBENCH_SOLVER_DIR", default_value = ".")]
    solver_dir: PathBuf,

    /// Number of solvers running at once
    #[arg(short, long, default_value = "2")]
    jobs: usize,

    /// Wall-clock limit per trial in seconds
    #[arg(long, default_value = "600")]
    timeout_secs: u64,

    /// Problem kinds to run: any of A, D, R
    #[arg(long, default_value = "ADR")]
    kinds: String,

    /// Root of the per-variant trace directories
    #[arg(long, default_value = "tmp-quick-traces")]
    trace_dir: PathBuf,

    /// Root of the per-variant info directories
    #[arg(long, default_value = "tmp-quick-info")]
    info_dir: PathBuf,

    /// Root of the per-variant energy directories
    #[arg(long, default_value = "tmp-quick-energy")]
    energy_dir: PathBuf,

    /// Keep starting trials after a solver crash
    #[arg(long)]
    keep_going: bool,

    /// Cross-check every completed trial with the verifier
    #[arg(long, requires = "oracle")]
    verify: bool,

    /// Verifier program
    #[arg(long, env = "TRACEBENCH_ORACLE")]
    oracle: Option<PathBuf>,

    /// Extra argument passed to the verifier (repeatable)
    #[arg(long = "oracle-arg")]
    oracle_args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracebench_core::init_tracing(cli.json, level);

    let ok = match cli.command {
        Commands::Run(args) => cmd_run(args).await?,
        Commands::Update {
            run_trace_dir,
            run_info_dir,
            result_trace_dir,
            result_info_dir,
        } => cmd_update(&run_trace_dir, &run_info_dir, &result_trace_dir, &result_info_dir)?,
        Commands::Compare {
            corpus,
            default_info_dir,
            hand_info_dir,
            info_dir_base,
            variants,
            html,
            csv,
            json_out,
        } => cmd_compare(
            &corpus,
            &default_info_dir,
            hand_info_dir.as_deref(),
            &info_dir_base,
            &variants,
            &html,
            csv.as_deref(),
            json_out.as_deref(),
        )?,
        Commands::Verify {
            src_model,
            model,
            trace,
            oracle,
            oracle_args,
            info,
        } => {
            cmd_verify(
                src_model.as_deref(),
                model.as_deref(),
                &trace,
                &oracle,
                oracle_args,
                info.as_deref(),
            )
            .await?
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

/// Run every variant over the corpus. Returns `false` when a trial failed.
async fn cmd_run(args: RunArgs) -> Result<bool> {
    let kinds = KindFilter::parse(&args.kinds).context("Invalid --kinds")?;
    let test_cases = discover(&args.corpus, &kinds)
        .with_context(|| format!("Failed to read corpus {:?}", args.corpus))?;

    let variants = args
        .variants
        .split_whitespace()
        .map(|spec| Variant::resolve(spec, &args.solver_dir))
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to resolve variants")?;
    if variants.is_empty() {
        anyhow::bail!("No variants given");
    }

    let layout = RunLayout::new(&args.trace_dir, &args.info_dir, &args.energy_dir);
    layout
        .prepare(variants.iter().map(|v| v.name.as_str()))
        .context("Failed to prepare output directories")?;
    let store = Arc::new(ResultStore::new(layout));

    let timeout = Duration::from_secs(args.timeout_secs);
    let config = DispatchConfig::new(args.jobs, timeout)?
        .with_fail_fast(!args.keep_going)
        .with_verify(args.verify);

    let verifier: Option<Arc<dyn TraceVerifier>> = match (&args.oracle, args.verify) {
        (Some(program), true) => {
            let oracle = CommandOracle::new(program)
                .with_args(args.oracle_args.clone())
                .with_timeout(timeout);
            let pool = Arc::new(OraclePool::new(oracle));
            let verifier: Arc<dyn TraceVerifier> = Arc::new(Verifier::new(pool));
            Some(verifier)
        }
        _ => None,
    };

    info!(
        test_cases = test_cases.len(),
        variants = variants.len(),
        jobs = args.jobs,
        "starting run"
    );
    let dispatcher = Dispatcher::new(config)?;
    let report = dispatcher
        .run(&test_cases, &variants, store, verifier)
        .await
        .context("Run aborted by a storage failure")?;

    print_run_summary(&report);
    Ok(!report.has_failures())
}

fn print_run_summary(report: &DispatchReport) {
    let dump = report.failure_dump();
    if !dump.is_empty() {
        print!("{dump}");
    }
    let counts: Vec<String> = report
        .counts()
        .iter()
        .map(|(status, n)| format!("{status}={n}"))
        .collect();
    println!("run {}: {}", report.run_id, counts.join(" "));
    println!(
        "n_failed {} n_succeeded {}",
        report.failed().len(),
        report.count(tracebench_core::TrialStatus::Success)
    );
    if report.aborted {
        warn!(cancelled = report.cancelled(), "run aborted after a solver failure");
    }
}

fn cmd_update(
    run_trace_dir: &Path,
    run_info_dir: &Path,
    result_trace_dir: &Path,
    result_info_dir: &Path,
) -> Result<bool> {
    let run_id = format!("update-{}", std::process::id());
    let _span = RunSpan::enter(&run_id);

    let ledger = Ledger::new(result_info_dir, result_trace_dir);
    let summary = ledger
        .sweep(run_info_dir, run_trace_dir)
        .with_context(|| format!("Failed to update results from {:?}", run_trace_dir))?;

    println!(
        "examined {} promoted {} skipped {}",
        summary.examined, summary.promoted, summary.skipped
    );
    Ok(true)
}

#[allow(clippy::too_many_arguments)]
fn cmd_compare(
    corpus: &Path,
    default_info_dir: &Path,
    hand_info_dir: Option<&Path>,
    info_dir_base: &Path,
    variants: &str,
    html: &Path,
    csv: Option<&Path>,
    json_out: Option<&Path>,
) -> Result<bool> {
    let titles = titles(corpus).with_context(|| format!("Failed to read corpus {:?}", corpus))?;

    let mut sources = vec![ColumnSource {
        column: Column::default_baseline(),
        info_dir: default_info_dir.to_path_buf(),
    }];
    if let Some(dir) = hand_info_dir {
        sources.push(ColumnSource {
            column: Column::hand_baseline(),
            info_dir: dir.to_path_buf(),
        });
    }
    for name in variants.split_whitespace() {
        sources.push(ColumnSource {
            column: Column::variant(name),
            info_dir: info_dir_base.join(name),
        });
    }
    let columns: Vec<Column> = sources.iter().map(|s| s.column.clone()).collect();
    validate_columns(&columns)?;

    let config = RankingConfig::default();
    let matrix = EnergyMatrix::load(&titles, &sources, config.invalid_energy)
        .context("Failed to load info records")?;
    let ranking = RankingEngine::new(config).rank(&matrix);

    tracebench_core::store::write_atomic(html, render_html(&ranking).as_bytes())
        .with_context(|| format!("Failed to write {:?}", html))?;
    if let Some(path) = csv {
        write_csv(path, &ranking).with_context(|| format!("Failed to write {:?}", path))?;
    }
    if let Some(path) = json_out {
        write_json(path, &ranking).with_context(|| format!("Failed to write {:?}", path))?;
    }

    info!(models = titles.len(), columns = sources.len(), "comparison written");
    println!("Wrote {}", html.display());
    Ok(true)
}

#[derive(Serialize)]
struct VerifySummary<'a> {
    trace: &'a Path,
    successful: bool,
    energy: u64,
    consumed_commands: u64,
}

async fn cmd_verify(
    src_model: Option<&Path>,
    model: Option<&Path>,
    trace: &Path,
    oracle: &Path,
    oracle_args: Vec<String>,
    info: Option<&Path>,
) -> Result<bool> {
    let factory = CommandOracle::new(oracle).with_args(oracle_args);
    let mut session = factory
        .create()
        .await
        .context("Failed to start verifier")?;
    let report = session
        .execute(src_model, model, trace)
        .await
        .context("Verifier failed")?;
    print!("{report}");

    let verdict = parse_report(&report).context("Unrecognised verifier report")?;
    if let Some(path) = info {
        let record = InfoRecord {
            successful: verdict.successful,
            energy: verdict.energy,
            consumed_commands: verdict.consumed_commands,
            message: verdict.message.clone(),
            status: None,
            engine_name: None,
            oracle: None,
        };
        write_json_atomic(path, &record).with_context(|| format!("Failed to write {:?}", path))?;
    }

    let summary = VerifySummary {
        trace,
        successful: verdict.successful,
        energy: verdict.energy,
        consumed_commands: verdict.consumed_commands,
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(verdict.successful)
}
