// Tue Jan 13 2026 - Alex

use anyhow::{bail, Context};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use pipeflow::{
    builtin::{builtin_table, StageSpec},
    config::FlowConfig,
    engine::{FlowBuilder, RunReport, StageRegistry},
    error::FlowError,
    io::{JsonWriter, JsonlReader, JsonlWriter, Sink, Source, TextReader, TextWriter},
    record::Record,
    utils::{format_duration, logging, pluralize, signal, LoggingUtils},
};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author = "Alex")]
#[command(version = "1.0.0")]
#[command(about = "Runs records through parallel processing stages", long_about = None)]
struct Args {
    /// Input file: `.jsonl` or `.json` for JSON lines, anything else is read as text
    #[arg(short, long)]
    input: PathBuf,

    /// Output file: `.jsonl`, `.json` (one array) or text
    #[arg(short, long, default_value = "output.jsonl")]
    output: PathBuf,

    /// Stage to run, as `name[:workers[:kind]]`; repeatable
    #[arg(short, long = "stage", required = true)]
    stages: Vec<String>,

    /// Workers for stages that do not name their own count
    #[arg(short, long)]
    workers: Option<usize>,

    #[arg(long)]
    offset: Option<usize>,

    #[arg(long)]
    head: Option<usize>,

    #[arg(long)]
    keep_order: bool,

    #[arg(short, long)]
    verbose: bool,

    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    no_progress: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Ticks a spinner for every record the wrapped sink takes.
struct ProgressSink {
    inner: Box<dyn Sink>,
    progress: Option<ProgressBar>,
}

impl Sink for ProgressSink {
    fn consume(&mut self, records: &mut dyn Iterator<Item = Record>) -> Result<(), FlowError> {
        match &self.progress {
            Some(pb) => {
                let mut ticking = records.inspect(|_| pb.inc(1));
                self.inner.consume(&mut ticking)
            }
            None => self.inner.consume(records),
        }
    }
}

fn open_source(path: &Path) -> Box<dyn Source> {
    match extension(path).as_deref() {
        Some("jsonl") | Some("json") => Box::new(JsonlReader::new(path)),
        _ => Box::new(TextReader::new(path)),
    }
}

fn open_sink(path: &Path) -> Box<dyn Sink> {
    match extension(path).as_deref() {
        Some("jsonl") => Box::new(JsonlWriter::new(path)),
        Some("json") => Box::new(JsonWriter::new(path).pretty(true)),
        _ => Box::new(TextWriter::new(path)),
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|ext| ext.to_string_lossy().to_lowercase())
}

fn load_config(args: &Args) -> anyhow::Result<FlowConfig> {
    let mut config = match &args.config {
        Some(path) => FlowConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => FlowConfig::default(),
    };

    if args.verbose {
        config.verbose = true;
    }
    if args.keep_order {
        config.keep_order = true;
    }
    if let Some(offset) = args.offset {
        config.offset = offset;
    }
    if args.head.is_some() {
        config.head_count = args.head;
    }

    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    match &args.log_file {
        Some(path) => LoggingUtils::init_logger_with_file(logging::level_for(config.verbose), path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => logging::init_from_env(config.verbose),
    }

    let default_workers = args.workers.unwrap_or_else(num_cpus::get);
    if default_workers == 0 {
        bail!("--workers must be at least 1");
    }

    let table = builtin_table();
    let mut builder = FlowBuilder::new("cli").table(table.clone());

    for raw in &args.stages {
        let spec: StageSpec = raw.parse()?;
        if !table.contains(&spec.name) {
            bail!(
                "Unknown stage '{}', available: {}",
                spec.name,
                table.names().join(", ")
            );
        }

        builder = builder
            .stage(&spec.name)
            .workers(spec.workers.unwrap_or(default_workers))
            .kind(spec.kind)
            .done();
    }

    let progress = if args.no_progress {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} records {msg}")
                .context("Invalid progress template")?,
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    };

    let sink = ProgressSink {
        inner: open_sink(&args.output),
        progress: progress.clone(),
    };

    println!("{} Reading {}", "[*]".blue(), args.input.display());

    let registry = StageRegistry::shared();
    let mut flow = builder
        .boxed_source(open_source(&args.input))
        .sink(sink)
        .config(config)
        .build(&registry)?;

    signal::install_sigint_handler()?;
    let interrupt = flow.interrupt_handle();
    let _watcher = signal::InterruptWatcher::spawn(Duration::from_millis(50), move || interrupt.trigger())?;

    let result = flow.run();

    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    match result {
        Ok(report) => {
            print_summary(&report, &args.output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} Run failed: {}", "[!]".red(), e);
            Err(e.into())
        }
    }
}

fn print_summary(report: &RunReport, output: &Path) {
    println!();
    println!("{}", "=".repeat(50).cyan());

    if report.interrupted {
        println!("{} Interrupted after {}", "[!]".yellow(), format_duration(report.elapsed));
    } else {
        println!("{} Completed in {}", "[+]".green(), format_duration(report.elapsed));
    }

    println!("{} Records read: {}", "[+]".green(), report.total);
    println!("{} Records written: {}", "[+]".green(), report.delivered.to_string().green());

    if report.errors > 0 {
        println!("{} Failed records: {}", "[!]".red(), report.errors.to_string().red());
    }
    if report.forced_jumps > 0 {
        println!(
            "{} Order degraded {}, {}",
            "[!]".yellow(),
            pluralize(report.forced_jumps as usize, "time", "times"),
            pluralize(report.late as usize, "late record", "late records")
        );
    }

    println!("{} Throughput: {:.1} records/s", "[*]".blue(), report.throughput());
    println!("{} Output: {}", "[+]".green(), output.display());
}
