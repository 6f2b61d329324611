use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::qos::ServiceClass;
use crate::traffic::Protocol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Met,
    Violated,
    /// The window had nothing to measure; see [`ClassReport::note`].
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub class: ServiceClass,
    pub guarantee_bps: Option<u64>,
    pub achieved_bps: Option<f64>,
    /// `guarantee × tolerance`
    pub required_bps: Option<f64>,
    /// Requested bytes of every class flow over the window. Below
    /// `required_bps` the class never asked for its guarantee.
    #[serde(default)]
    pub offered_bps: Option<f64>,
    pub window_secs: Option<f64>,
    /// Last-hop bytes attributed to the class inside its window.
    pub attributed_bytes: u64,
    pub flows: usize,
    pub failed_flows: usize,
    pub mean_latency_ms: Option<f64>,
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowPairReport {
    pub class: ServiceClass,
    pub src: String,
    pub dst: String,
    pub flows: usize,
    pub failed_flows: usize,
    pub requested_bytes: u64,
    pub transferred_bytes: u64,
    /// Last-hop bytes seen in captures for this src/dst address pair.
    pub observed_bytes: u64,
    pub mean_latency_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProtocolShare {
    pub count: u64,
    pub fraction: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostTraffic {
    pub sent_bytes: u64,
    pub received_bytes: u64,
}

/// Terminal artifact of a run. Every map is ordered so the serialized form is
/// stable across re-analysis of the same inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub tolerance: f64,
    pub classes: BTreeMap<ServiceClass, ClassReport>,
    pub flow_pairs: Vec<FlowPairReport>,
    pub switch_volumes: BTreeMap<String, u64>,
    pub link_volumes: BTreeMap<String, u64>,
    pub hosts: BTreeMap<String, HostTraffic>,
    pub protocols: BTreeMap<Protocol, ProtocolShare>,
    pub total_samples: usize,
}

impl AnalysisReport {
    pub fn verdict(&self, class: ServiceClass) -> Option<Verdict> {
        self.classes.get(&class).map(|c| c.verdict)
    }

    pub fn all_met(&self) -> bool {
        !self.classes.is_empty() && self.classes.values().all(|c| c.verdict == Verdict::Met)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
