//! 运行目录与持久化产物
//!
//! ```text
//! <run>/logs/flows.jsonl       流记录（一次运行内追加写）
//! <run>/captures/<link>.jsonl  每条链路一个抓包文件
//! <run>/policy.json            编译后的队列配置与各类别保证带宽
//! <run>/report.json            分析报告（临时文件 + rename，不会半写）
//! ```

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::AnalysisReport;
use crate::config::RoutingMode;
use crate::error::Error;
use crate::qos::{QueueConfig, ServiceClass};
use crate::substrate::{CaptureSample, read_capture_file};
use crate::traffic::FlowRecord;

pub const FLOW_LOG: &str = "logs/flows.jsonl";
pub const CAPTURE_DIR: &str = "captures";
pub const POLICY_FILE: &str = "policy.json";
pub const REPORT_FILE: &str = "report.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the run directory tree. Artifacts left by an earlier run in the
    /// same directory are removed first so a run never mixes with another.
    pub fn create(&self) -> Result<(), Error> {
        let captures = self.capture_dir();
        if captures.exists() {
            fs::remove_dir_all(&captures).map_err(|e| Error::io(&captures, e))?;
        }
        for file in [self.flow_log(), self.policy_file(), self.report_file()] {
            match fs::remove_file(&file) {
                Ok(()) => debug!(path = %file.display(), "stale artifact removed"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(&file, e)),
            }
        }
        for dir in [self.root.join("logs"), captures] {
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn flow_log(&self) -> PathBuf {
        self.root.join(FLOW_LOG)
    }

    pub fn capture_dir(&self) -> PathBuf {
        self.root.join(CAPTURE_DIR)
    }

    pub fn policy_file(&self) -> PathBuf {
        self.root.join(POLICY_FILE)
    }

    pub fn report_file(&self) -> PathBuf {
        self.root.join(REPORT_FILE)
    }
}

/// What the analyzer needs from the compiled policy to re-run offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyArtifact {
    pub qos_enabled: bool,
    pub routing: RoutingMode,
    pub queues: Vec<QueueConfig>,
    pub guarantees: BTreeMap<ServiceClass, u64>,
}

pub fn append_flow_log(path: &Path, flows: &[FlowRecord]) -> Result<(), Error> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::io(path, e))?;
    let mut w = BufWriter::new(file);
    for record in flows {
        serde_json::to_writer(&mut w, record)?;
        w.write_all(b"\n").map_err(|e| Error::io(path, e))?;
    }
    w.flush().map_err(|e| Error::io(path, e))?;
    debug!(path = %path.display(), records = flows.len(), "flow log written");
    Ok(())
}

pub fn read_flow_log(path: &Path) -> Result<Vec<FlowRecord>, Error> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(Error::from))
        .collect()
}

/// Every `*.jsonl` under `dir`, merged and ordered by (timestamp, link).
pub fn read_captures(dir: &Path) -> Result<Vec<CaptureSample>, Error> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| Error::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
        .collect();
    files.sort();

    let mut samples = Vec::new();
    for file in &files {
        samples.extend(read_capture_file(file)?);
    }
    samples.sort_by(|a, b| (a.ts, &a.link).cmp(&(b.ts, &b.link)));
    Ok(samples)
}

pub fn write_policy(path: &Path, policy: &PolicyArtifact) -> Result<(), Error> {
    let json = serde_json::to_string_pretty(policy)?;
    fs::write(path, json).map_err(|e| Error::io(path, e))
}

pub fn read_policy(path: &Path) -> Result<PolicyArtifact, Error> {
    let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(serde_json::from_str(&raw)?)
}

/// Write to `<path>.tmp` and rename over `path`.
pub fn write_report(path: &Path, report: &AnalysisReport) -> Result<(), Error> {
    let json = report.to_json()?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| Error::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| Error::io(path, e))?;
    debug!(path = %path.display(), "report written");
    Ok(())
}

pub fn read_report(path: &Path) -> Result<AnalysisReport, Error> {
    let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(serde_json::from_str(&raw)?)
}
