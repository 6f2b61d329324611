use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use qosim_rs::analysis::AnalysisReport;
use qosim_rs::config::{ExperimentConfig, RoutingMode};
use qosim_rs::error::Error;
use qosim_rs::experiment::{self, SuiteSummary};
use tracing::error;

#[derive(Debug, Parser)]
#[command(
    name = "qos-experiment",
    about = "Run multi-class QoS experiments on an emulated three-tier network"
)]
struct Args {
    /// Path to experiment.json; defaults to the built-in three-switch experiment
    #[arg(long)]
    config: Option<PathBuf>,

    /// Install QoS queues
    #[arg(long, conflicts_with = "no_qos")]
    qos: bool,

    /// Do not install QoS queues
    #[arg(long)]
    no_qos: bool,

    /// Override routing: static or none
    #[arg(long)]
    routing: Option<RoutingMode>,

    /// Override traffic duration (seconds)
    #[arg(long)]
    duration: Option<f64>,

    /// Override compliance tolerance (achieved >= guarantee × tolerance)
    #[arg(long)]
    tolerance: Option<f64>,

    /// 30 s preset with QoS and static routing
    #[arg(long)]
    demo: bool,

    /// Run all four QoS/routing combinations
    #[arg(long, conflicts_with = "demo")]
    all: bool,

    /// Output directory for logs, captures and reports
    #[arg(long, default_value = "qos_results")]
    out_dir: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();
    match execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "experiment failed");
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn execute(args: Args) -> Result<(), Error> {
    let mut config = match &args.config {
        Some(path) => ExperimentConfig::load(path)?,
        None if args.demo => ExperimentConfig::demo(),
        None => ExperimentConfig::default(),
    };
    apply_overrides(&mut config, &args);
    config.validate()?;

    if args.all {
        let summary = experiment::run_suite(&config, &args.out_dir, experiment::run)?;
        print_suite(&summary, &args.out_dir);
        return Ok(());
    }

    let report = experiment::run(config, &args.out_dir)?;
    print_report(&report, &args.out_dir);
    Ok(())
}

fn apply_overrides(config: &mut ExperimentConfig, args: &Args) {
    if args.demo {
        config.options.demo = true;
        config.options.qos = true;
        config.options.routing = RoutingMode::Static;
    }
    if args.qos {
        config.options.qos = true;
    }
    if args.no_qos {
        config.options.qos = false;
    }
    if let Some(routing) = args.routing {
        config.options.routing = routing;
    }
    if let Some(secs) = args.duration {
        config.duration_secs = secs;
    }
    if let Some(tolerance) = args.tolerance {
        config.tolerance = tolerance;
    }
}

fn print_report(report: &AnalysisReport, out_dir: &Path) {
    println!("tolerance: {}", report.tolerance);
    for (class, c) in &report.classes {
        let achieved = c
            .achieved_bps
            .map(|bps| format!("{:.3} Mbit/s", bps / 1e6))
            .unwrap_or_else(|| "-".to_string());
        let offered = c
            .offered_bps
            .map(|bps| format!("{:.3} Mbit/s", bps / 1e6))
            .unwrap_or_else(|| "-".to_string());
        let guarantee = c
            .guarantee_bps
            .map(|bps| format!("{:.3} Mbit/s", bps as f64 / 1e6))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<6} verdict={:?} achieved={achieved} offered={offered} guarantee={guarantee} flows={} failed={}",
            class.name(),
            c.verdict,
            c.flows,
            c.failed_flows
        );
        if let Some(note) = &c.note {
            println!("       note: {note}");
        }
    }
    println!("report: {}", out_dir.join(experiment::artifacts::REPORT_FILE).display());
}

fn print_suite(summary: &SuiteSummary, out_dir: &Path) {
    for e in &summary.experiments {
        match &e.error {
            None => println!("{:<12} ok all_met={:?}", e.name, e.all_met.unwrap_or(false)),
            Some(err) => println!("{:<12} failed: {err}", e.name),
        }
    }
    println!(
        "summary: {}",
        out_dir.join(experiment::SUMMARY_FILE).display()
    );
}
