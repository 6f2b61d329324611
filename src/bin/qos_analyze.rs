use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use qosim_rs::analysis::DEFAULT_TOLERANCE;
use qosim_rs::error::Error;
use qosim_rs::experiment::{self, artifacts};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(
    name = "qos-analyze",
    about = "Re-analyze a finished run directory with another tolerance"
)]
struct Args {
    /// Run directory written by qos_experiment
    #[arg(long)]
    run_dir: PathBuf,

    /// Compliance tolerance (achieved >= guarantee × tolerance)
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    tolerance: f64,

    /// Output report path; defaults to <run_dir>/report.json
    #[arg(long)]
    out: Option<PathBuf>,
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
    match execute(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "analysis failed");
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn execute(args: &Args) -> Result<(), Error> {
    let report = experiment::reanalyze(&args.run_dir, args.tolerance)?;
    let out = args
        .out
        .clone()
        .unwrap_or_else(|| args.run_dir.join(artifacts::REPORT_FILE));
    artifacts::write_report(&out, &report)?;
    info!(path = %out.display(), "report written");

    for (class, c) in &report.classes {
        match &c.note {
            Some(note) => println!("{:<6} verdict={:?} ({note})", class.name(), c.verdict),
            None => println!("{:<6} verdict={:?}", class.name(), c.verdict),
        }
    }
    Ok(())
}
