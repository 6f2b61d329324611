//! The four-way comparison: QoS on/off × routing none/static.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analysis::AnalysisReport;
use crate::config::{ExperimentConfig, RoutingMode};
use crate::error::Error;

pub const SUMMARY_FILE: &str = "experiment_summary.json";

/// (qos, routing) in run order.
pub const SUITE: [(bool, RoutingMode); 4] = [
    (false, RoutingMode::None),
    (true, RoutingMode::None),
    (false, RoutingMode::Static),
    (true, RoutingMode::Static),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteEntry {
    pub name: String,
    pub qos: bool,
    pub routing: RoutingMode,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_met: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub experiments: Vec<SuiteEntry>,
}

impl SuiteSummary {
    pub fn succeeded(&self) -> usize {
        self.experiments.iter().filter(|e| e.success).count()
    }
}

/// Run every combination into `<out_dir>/<name>/` via `runner`. A failing
/// experiment is recorded and the suite moves on.
pub fn run_suite<F>(base: &ExperimentConfig, out_dir: &Path, mut runner: F) -> Result<SuiteSummary, Error>
where
    F: FnMut(ExperimentConfig, &Path) -> Result<AnalysisReport, Error>,
{
    fs::create_dir_all(out_dir).map_err(|e| Error::io(out_dir, e))?;
    let mut summary = SuiteSummary::default();

    for (qos, routing) in SUITE {
        let mut config = base.clone().with_options(qos, routing);
        config.name = None;
        let name = config.experiment_name();
        info!(%name, "▶️ suite experiment");

        let entry = match runner(config, &out_dir.join(&name)) {
            Ok(report) => SuiteEntry {
                name,
                qos,
                routing,
                success: true,
                all_met: Some(report.all_met()),
                error: None,
            },
            Err(err) => {
                warn!(%name, error = %err, "suite experiment failed");
                SuiteEntry {
                    name,
                    qos,
                    routing,
                    success: false,
                    all_met: None,
                    error: Some(err.to_string()),
                }
            }
        };
        summary.experiments.push(entry);
    }

    let path = out_dir.join(SUMMARY_FILE);
    let json = serde_json::to_string_pretty(&summary)?;
    fs::write(&path, json).map_err(|e| Error::io(&path, e))?;
    info!(
        succeeded = summary.succeeded(),
        total = summary.experiments.len(),
        "✅ suite finished"
    );
    Ok(summary)
}
