//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing::info;

use stagechain_core::processor::builtin_processors;
use stagechain_core::{
    ChainProgress, ChainReport, DelimitedFormat, Manager, RecordFormat, RunOutcome,
};
use stagechain_shared::{
    AppConfig, PipelineError, Record, init_config, load_config, load_config_from, load_records,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// stagechain: staged record pipelines with snapshot recovery.
#[derive(Parser)]
#[command(
    name = "stagechain",
    version,
    about = "Run records through staged pipelines with snapshot recovery and a capacity budget.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.stagechain/stagechain.toml.
    #[arg(long, env = "STAGECHAIN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Multi-format batch, chained dispatch, and a recovery probe on sample data.
    Demo,

    /// Dispatch records from a JSON file positionally to the standard pipelines.
    Batch {
        /// JSON array of records (objects, strings, string/number arrays, null).
        #[arg(short, long)]
        input: PathBuf,

        /// Override the configured capacity.
        #[arg(short, long)]
        capacity: Option<u64>,

        /// Fail when any record could not be recovered from a snapshot.
        #[arg(long)]
        strict: bool,
    },

    /// Thread records through every pipeline in sequence.
    Chain {
        /// Number of records (defaults to the configured value).
        #[arg(short, long, allow_negative_numbers = true)]
        records: Option<i64>,

        /// Override the configured capacity.
        #[arg(short, long)]
        capacity: Option<u64>,
    },

    /// Run the single-shot numeric, text, and log processors on sample data.
    Process,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "warn",
        1 => "stagechain_cli=info,stagechain_core=info,stagechain_shared=info",
        _ => "stagechain_cli=debug,stagechain_core=debug,stagechain_shared=debug",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Command::Demo => cmd_demo(&config),
        Command::Batch {
            input,
            capacity,
            strict,
        } => cmd_batch(config, &input, capacity, strict),
        Command::Chain { records, capacity } => cmd_chain(config, records, capacity),
        Command::Process => cmd_process(),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_demo(config: &AppConfig) -> Result<()> {
    let mut manager = Manager::from_config(config);

    println!("Pipeline capacity: {} records", manager.capacity().initial());
    println!();
    println!("Stage 1: Input validation and parsing");
    println!("Stage 2: Data transformation and enrichment");
    println!("Stage 3: Output formatting and delivery");
    println!();

    println!("=== Multi-Format Data Processing ===");
    println!();
    let records = vec![
        Record::structured([
            ("sensor", json!("temp")),
            ("value", json!(23.5)),
            ("unit", json!("C")),
        ]),
        DelimitedFormat::from(&config.pipeline).representative(),
        Record::text(config.pipeline.sentinel.clone()),
    ];
    print_batch(&mut manager, records);

    println!("=== Pipeline Chaining Demo ===");
    let names: Vec<&str> = manager.pipelines().iter().map(|p| p.id()).collect();
    println!("{}", names.join(" -> "));
    println!();
    match manager.dispatch_chain(config.chain.records) {
        Ok(report) => print_chain_report(&report),
        Err(e) => println!("Pipeline execution error: {e}"),
    }
    println!();

    println!("=== Error Recovery Test ===");
    println!("Simulating pipeline failure...");
    if let Some(outcome) = manager.probe_recovery(0, Record::text("bad input")) {
        if let Some(error) = outcome.error() {
            println!("{error}");
        }
        println!("{outcome}");
    }
    println!();

    println!("=== Pipeline Status ===");
    print_status(&manager);

    info!(
        remaining = manager.capacity().remaining(),
        "demo complete"
    );
    Ok(())
}

fn cmd_batch(
    mut config: AppConfig,
    input: &Path,
    capacity: Option<u64>,
    strict: bool,
) -> Result<()> {
    if let Some(capacity) = capacity {
        config.manager.capacity = capacity;
    }
    let records = load_records(input)?;
    info!(path = %input.display(), records = records.len(), "loaded records");

    let mut manager = Manager::from_config(&config);
    if records.len() > manager.pipelines().len() {
        println!(
            "note: {} records supplied for {} pipelines; extra records are ignored",
            records.len(),
            manager.pipelines().len()
        );
    }
    let outcomes = print_batch(&mut manager, records);
    print_status(&manager);
    println!(
        "Capacity remaining: {}/{}",
        manager.capacity().remaining(),
        manager.capacity().initial()
    );

    let unrecovered = unrecovered_failures(outcomes);
    if strict && !unrecovered.is_empty() {
        return Err(eyre!(
            "{} record(s) failed with no snapshot to restore",
            unrecovered.len()
        ));
    }
    Ok(())
}

/// Errors from runs that could not be resolved by restoring a snapshot.
fn unrecovered_failures(outcomes: Vec<RunOutcome>) -> Vec<PipelineError> {
    outcomes
        .into_iter()
        .filter_map(|outcome| outcome.into_result().err())
        .filter(|error| !error.is_recoverable())
        .collect()
}

fn cmd_chain(mut config: AppConfig, records: Option<i64>, capacity: Option<u64>) -> Result<()> {
    if let Some(capacity) = capacity {
        config.manager.capacity = capacity;
    }
    let count = records.unwrap_or(config.chain.records);

    let mut manager = Manager::from_config(&config);
    let progress = CliProgress::new();
    let report = manager
        .dispatch_chain_with_progress(count, &progress)
        .map_err(|e| eyre!("pipeline execution error: {e}"))?;

    print_chain_report(&report);
    if let Some(output) = &report.final_output {
        println!("Last output: {output}");
    }
    Ok(())
}

fn cmd_process() -> Result<()> {
    let samples = [
        Record::Numbers(vec![1.0, 2.0, 3.0, 4.0, 5.0]),
        Record::text("Hello Nexus World"),
        Record::text("ERROR: Connection timeout"),
    ];

    for (processor, record) in builtin_processors().iter().zip(samples) {
        println!("Initializing {} Processor...", processor.name());
        println!("Processing data: {record}");
        if !processor.validate(&record) {
            println!("Validation: {} data rejected", processor.name());
            println!();
            continue;
        }
        println!("Validation: {} data verified", processor.name());
        match processor.process(&record) {
            Ok(result) => println!("{}", processor.format_output(&result)),
            Err(e) => println!("{e}"),
        }
        println!();
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn print_batch(manager: &mut Manager, records: Vec<Record>) -> Vec<RunOutcome> {
    let inputs: Vec<(String, String, String)> = manager
        .pipelines()
        .iter()
        .zip(&records)
        .map(|(p, r)| (p.id().to_string(), p.format().describe().to_string(), r.to_string()))
        .collect();

    let outcomes = manager.dispatch_batch(records);
    for ((id, transform, input), outcome) in inputs.iter().zip(&outcomes) {
        println!("Processing {id} data through pipeline...");
        println!("Input: {input}");
        println!("Transform: {transform}");
        println!("Output: {outcome}");
        println!();
    }
    if outcomes.len() < inputs.len() {
        println!(
            "Capacity exhausted: {} of {} records skipped",
            inputs.len() - outcomes.len(),
            inputs.len()
        );
        println!();
    }
    outcomes
}

fn print_status(manager: &Manager) {
    for pipeline in manager.pipelines() {
        let stats = pipeline.stats();
        let latest = pipeline
            .latest_snapshot()
            .map(|s| s.taken_at().format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{}: {} runs ({} ok, {} recovered, {} unavailable), {} snapshots, last snapshot {latest}",
            pipeline.id(),
            stats.runs,
            stats.succeeded,
            stats.recovered,
            stats.unavailable,
            pipeline.backup_depth(),
        );
    }
    println!();
}

fn print_chain_report(report: &ChainReport) {
    println!("{report}");
    println!(
        "Performance: {:.0}% efficiency, {:.2}s total processing time",
        report.efficiency(),
        report.elapsed.as_secs_f64()
    );
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Chain progress bar using indicatif.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:30}] {pos}/{len} records")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { bar }
    }
}

impl ChainProgress for CliProgress {
    fn start(&self, total: u64) {
        self.bar.set_length(total);
        self.bar
            .set_draw_target(indicatif::ProgressDrawTarget::stderr());
    }

    fn traversal_done(&self, current: u64, _total: u64) {
        self.bar.set_position(current);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
