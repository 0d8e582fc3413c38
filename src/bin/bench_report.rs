use std::{io::Write, path::PathBuf};

use bench_insight::{ingest, AppState, ReportConfig, Result, ViewKind, ViewReport};
use clap::Parser;
use strum::IntoEnumIterator;

#[derive(Parser, Debug)]
#[command(author, version, about = "Aggregate benchmark result files into analysis reports", long_about = None)]
struct Args {
    /// Result files (`.csv`, or JSON lines for any other extension)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// JSON report config with filter criteria, ensembles and analysis settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// View to print; every view when omitted
    #[arg(short, long)]
    view: Option<String>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    )
    .format(|buf, record| writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args()))
    .target(env_logger::Target::Stderr)
    .init();

    if let Err(e) = run(&args) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let views: Vec<ViewKind> = match &args.view {
        Some(name) => vec![ViewKind::parse(name)?],
        None => ViewKind::iter().collect(),
    };

    let mut records = Vec::new();
    for file in &args.files {
        records.extend(ingest::load_records(file)?);
    }
    log::info!("Loaded {} records from {} files", records.len(), args.files.len());

    let config = match &args.config {
        Some(path) => ReportConfig::load(path)?,
        None => ReportConfig::default(),
    };
    let state = AppState::from_config(records, config)?;

    let reports: Vec<ViewReport> = views.into_iter().map(|kind| state.view(kind)).collect();
    let output = if args.pretty {
        serde_json::to_string_pretty(&reports)
    } else {
        serde_json::to_string(&reports)
    };
    match output {
        Ok(json) => println!("{json}"),
        Err(e) => {
            log::error!("Unable to serialize reports: {e}");
            std::process::exit(1);
        }
    }
    Ok(())
}
