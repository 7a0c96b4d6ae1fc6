//! Plasma Fault Detector CLI
//!
//! Batch stuck-at-zero detection for recorded diagnostic signals.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use plasma_fault_detector::{
    config::Config,
    core::{BatchOutcome, FeatureExtractor, WindowSpec},
    report::{ConsoleSink, JsonLinesSink, ResultRecord, ResultSink, RunLog, RunReport},
    scoring::ModelArtifacts,
    source::{SeriesLoader, Unit, WorkbookLoader},
    startup::prepare_run,
    StartupError, VERSION,
};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Exit code for failures before any unit was processed.
const EXIT_STARTUP: u8 = 2;

/// Exit code when the run was interrupted.
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(name = "fault-detector")]
#[command(version = VERSION)]
#[command(about = "Classify plasma diagnostic signals as NORMAL or FAULT", long_about = None)]
struct Cli {
    /// Log pipeline details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every signal file in a folder
    Run {
        /// Folder containing the signal files (defaults to the configured data dir)
        #[arg(long, short)]
        data: Option<PathBuf>,

        /// Folder containing scaler.json and svm_model.json
        #[arg(long, short)]
        models: Option<PathBuf>,

        /// Number of files scored concurrently (output order is unaffected)
        #[arg(long, short)]
        workers: Option<usize>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Write a JSON report of the run to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Print the extracted features of a single file
    Inspect {
        /// Signal file to inspect
        file: PathBuf,
    },

    /// Show the loaded model
    Model {
        /// Folder containing scaler.json and svm_model.json
        #[arg(long, short)]
        models: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration
    Config,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable lines with banners
    Text,
    /// One JSON object per file
    Jsonl,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Run {
            data,
            models,
            workers,
            format,
            report,
            no_color,
        } => cmd_run(data, models, workers, format, report, no_color),
        Commands::Inspect { file } => cmd_inspect(file),
        Commands::Model { models, json } => cmd_model(models, json),
        Commands::Config => cmd_config(),
    }
}

fn cmd_run(
    data: Option<PathBuf>,
    models: Option<PathBuf>,
    workers: Option<usize>,
    format: OutputFormat,
    report_path: Option<PathBuf>,
    no_color: bool,
) -> anyhow::Result<ExitCode> {
    let mut config = Config::load().context("loading configuration")?;
    if let Some(workers) = workers {
        config.workers = workers;
    }
    let data_dir = data.unwrap_or_else(|| config.data_dir.clone());
    let model_dir = models.unwrap_or_else(|| config.model_dir.clone());

    let prepared = match prepare_run(&config, &data_dir, &model_dir) {
        Ok(prepared) => prepared,
        Err(e) => return Ok(startup_failure(&e)),
    };

    let cancel = prepared.classifier.cancel_flag();
    install_ctrlc_handler(cancel)?;

    let mut stream = match prepared.classifier.classify_all(prepared.units) {
        BatchOutcome::Results(stream) => stream,
        BatchOutcome::NoUnits => {
            return Ok(startup_failure(&StartupError::NoUnits {
                folder: data_dir,
                extension: config.extension.clone(),
            }))
        }
    };

    let mut sink: Box<dyn ResultSink> = match format {
        OutputFormat::Text => {
            let color = !no_color && io::stdout().is_terminal();
            Box::new(ConsoleSink::new(io::stdout().lock()).with_color(color))
        }
        OutputFormat::Jsonl => Box::new(JsonLinesSink::new(io::stdout().lock())),
    };

    let log = RunLog::new();
    let mut records = Vec::new();

    sink.begin(stream.total())?;
    for result in stream.by_ref() {
        log.record(&result);
        sink.record(&result)?;
        if report_path.is_some() {
            records.push(ResultRecord::from(&result));
        }
    }
    let cancelled = stream.was_cancelled();
    sink.finish(&log.stats(), cancelled)?;
    drop(sink);

    tracing::info!(run_id = %log.run_id(), "{}", log.summary().replace('\n', " "));

    if let Some(path) = report_path {
        let mut report = RunReport::new(log.stats(), &prepared.data_dir, &prepared.model_dir);
        report.cancelled = cancelled;
        report.results = records;
        report
            .write_to(&path)
            .with_context(|| format!("writing report to {}", path.display()))?;
        eprintln!("Report written to {}", path.display());
    }

    Ok(if cancelled {
        ExitCode::from(EXIT_CANCELLED)
    } else {
        ExitCode::SUCCESS
    })
}

fn startup_failure(e: &StartupError) -> ExitCode {
    tracing::error!(error = %e, "startup failed");
    eprintln!("Error: {e}");
    ExitCode::from(EXIT_STARTUP)
}

fn cmd_inspect(file: PathBuf) -> anyhow::Result<ExitCode> {
    let config = Config::load().context("loading configuration")?;
    let features = &config.features;

    let loader = WorkbookLoader::new(features.section_name.clone());
    let unit = Unit::from_path(&file);
    let raw = loader
        .load(&unit)
        .with_context(|| format!("loading {}", file.display()))?;

    let extractor = FeatureExtractor::new(features);
    let matrix = extractor
        .extract_raw(&raw)
        .with_context(|| format!("extracting features from {}", file.display()))?;

    let spec = WindowSpec::from_config(features);
    println!("Extracted Features: {}", unit.id);
    println!("  mean_mean : {:.6e}", matrix.mean_mean().unwrap_or(f64::NAN));
    println!("  var_mean  : {:.6e}", matrix.var_mean().unwrap_or(f64::NAN));
    println!(
        "  windows   : {} x {} samples, hop {}, over {} samples from {} ms",
        spec.window_count(),
        spec.window_size,
        spec.hop_size,
        spec.total_samples,
        features.start_time
    );

    Ok(ExitCode::SUCCESS)
}

fn cmd_model(models: Option<PathBuf>, json: bool) -> anyhow::Result<ExitCode> {
    let config = Config::load().context("loading configuration")?;
    let model_dir = models.unwrap_or(config.model_dir);

    let model = match ModelArtifacts::load(&model_dir) {
        Ok(model) => model,
        Err(e) => return Ok(startup_failure(&StartupError::Artifacts(e))),
    };

    let metadata = model.metadata();
    let classifier = model.classifier();

    if json {
        let value = serde_json::json!({
            "model_dir": model_dir,
            "kernel": classifier.kernel,
            "support_vectors": classifier.n_support(),
            "classes": classifier.classes,
            "scaler": model.scaler(),
            "metadata": metadata,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("Model");
    println!("=====");
    println!();
    println!("Directory: {:?}", model_dir);
    println!("Kernel: {}", classifier.kernel.name());
    println!("Support vectors: {}", classifier.n_support());
    println!("Features: {}", metadata.feature_names.join(", "));
    println!(
        "Labels: {} = FAULT, {} = NORMAL",
        metadata.labels.fault, metadata.labels.normal
    );
    match &metadata.training {
        Some(t) => println!(
            "Trained with: sheet {}, start {} ms, {} samples, window {}, hop {}",
            t.section_name, t.start_time, t.total_samples, t.window_size, t.hop_size
        ),
        None => println!("Trained with: unknown"),
    }
    if let Some(description) = &metadata.description {
        println!("Description: {description}");
    }

    Ok(ExitCode::SUCCESS)
}

fn cmd_config() -> anyhow::Result<ExitCode> {
    let config = Config::load().context("loading configuration")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(ExitCode::SUCCESS)
}

/// Set up Ctrl+C handler.
fn install_ctrlc_handler(cancel: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        cancel.store(true, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
