//! Compliance analysis.
//!
//! Joins flow records with capture samples and checks each class's achieved
//! throughput against its guarantee. Pure: same inputs and tolerance, same
//! report.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use tracing::{debug, info};

use super::report::{
    AnalysisReport, ClassReport, FlowPairReport, HostTraffic, ProtocolShare, Verdict,
};
use crate::error::ConfigError;
use crate::qos::ServiceClass;
use crate::substrate::CaptureSample;
use crate::time::Timestamp;
use crate::traffic::{FlowRecord, Protocol};

/// Default slack on the guarantee: 10% for measurement jitter.
pub const DEFAULT_TOLERANCE: f64 = 0.9;

/// Relative slack for float rounding when achieved equals required.
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerConfig {
    tolerance: f64,
}

impl AnalyzerConfig {
    pub fn new(tolerance: f64) -> Result<Self, ConfigError> {
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(ConfigError::InvalidTolerance(tolerance));
        }
        Ok(Self { tolerance })
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Analyzer {
    config: AnalyzerConfig,
}

/// Measurement window of one class.
#[derive(Debug, Clone, Copy)]
struct Window {
    start: Timestamp,
    end: Timestamp,
}

impl Window {
    fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.start && ts <= self.end
    }

    fn secs(&self) -> f64 {
        self.end.since(self.start).as_secs_f64()
    }
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    #[tracing::instrument(skip_all, fields(flows = flows.len(), samples = samples.len(), tolerance = self.config.tolerance))]
    pub fn analyze(
        &self,
        flows: &[FlowRecord],
        samples: &[CaptureSample],
        guarantees: &BTreeMap<ServiceClass, u64>,
    ) -> AnalysisReport {
        let mut classes: Vec<ServiceClass> = flows
            .iter()
            .map(|f| f.class)
            .chain(guarantees.keys().copied())
            .collect();
        classes.sort();
        classes.dedup();

        let windows: BTreeMap<ServiceClass, Window> = classes
            .iter()
            .filter_map(|&c| window_of(flows, c).map(|w| (c, w)))
            .collect();

        // 样本只在其类别的窗口内才算作已归属
        let attributed: Vec<&CaptureSample> = samples
            .iter()
            .filter(|s| {
                s.class
                    .and_then(|c| windows.get(&c))
                    .is_some_and(|w| w.contains(s.ts))
            })
            .collect();

        let class_reports: BTreeMap<ServiceClass, ClassReport> = classes
            .iter()
            .map(|&c| {
                let report = self.class_report(c, flows, &attributed, windows.get(&c), guarantees);
                debug!(class = %c, verdict = ?report.verdict, achieved_bps = ?report.achieved_bps, "class analyzed");
                (c, report)
            })
            .collect();

        let mut switch_volumes: BTreeMap<String, u64> = BTreeMap::new();
        let mut link_volumes: BTreeMap<String, u64> = BTreeMap::new();
        for s in &attributed {
            *link_volumes.entry(s.link.clone()).or_insert(0) += s.bytes;
            for sw in &s.switches {
                *switch_volumes.entry(sw.clone()).or_insert(0) += s.bytes;
            }
        }

        let report = AnalysisReport {
            tolerance: self.config.tolerance,
            classes: class_reports,
            flow_pairs: flow_pairs(flows, samples),
            switch_volumes,
            link_volumes,
            hosts: host_traffic(flows, samples),
            protocols: protocol_histogram(samples),
            total_samples: samples.len(),
        };
        info!(
            classes = report.classes.len(),
            all_met = report.all_met(),
            "✅ analysis complete"
        );
        report
    }

    fn class_report(
        &self,
        class: ServiceClass,
        flows: &[FlowRecord],
        attributed: &[&CaptureSample],
        window: Option<&Window>,
        guarantees: &BTreeMap<ServiceClass, u64>,
    ) -> ClassReport {
        let of_class: Vec<&FlowRecord> = flows.iter().filter(|f| f.class == class).collect();
        let failed_flows = of_class.iter().filter(|f| f.is_failed()).count();
        let guarantee_bps = guarantees.get(&class).copied();
        let attributed_bytes: u64 = attributed
            .iter()
            .filter(|s| s.class == Some(class) && s.last_hop)
            .map(|s| s.bytes)
            .sum();

        let mut report = ClassReport {
            class,
            guarantee_bps,
            achieved_bps: None,
            required_bps: guarantee_bps.map(|g| g as f64 * self.config.tolerance),
            offered_bps: None,
            window_secs: window.map(Window::secs),
            attributed_bytes,
            flows: of_class.len(),
            failed_flows,
            mean_latency_ms: mean_latency_ms(of_class.iter().copied()),
            verdict: Verdict::InsufficientData,
            note: None,
        };

        let Some(window) = window else {
            report.note = Some("no successful flows".into());
            return report;
        };
        let secs = window.secs();
        if secs <= 0.0 {
            report.note = Some("zero-length measurement window".into());
            return report;
        }
        let requested: u64 = of_class.iter().map(|f| f.requested_bytes).sum();
        let offered = requested as f64 * 8.0 / secs;
        report.offered_bps = Some(offered);
        if attributed_bytes == 0 {
            report.note = Some("no bytes observed in the measurement window".into());
            return report;
        }
        let achieved = attributed_bytes as f64 * 8.0 / secs;
        report.achieved_bps = Some(achieved);

        match report.required_bps {
            None => report.note = Some("no guarantee configured for this class".into()),
            Some(required) => {
                report.verdict = if achieved >= required * (1.0 - EPSILON) {
                    Verdict::Met
                } else {
                    Verdict::Violated
                };
                if report.verdict == Verdict::Violated && offered < required {
                    report.note = Some(format!(
                        "offered load {:.3} Mbit/s is below the required {:.3} Mbit/s; the class did not ask for its guarantee",
                        offered / 1e6,
                        required / 1e6
                    ));
                }
            }
        }
        report
    }
}

/// `[min start, max end]` over the class's successful flows.
fn window_of(flows: &[FlowRecord], class: ServiceClass) -> Option<Window> {
    let ok = flows.iter().filter(|f| f.class == class && !f.is_failed());
    ok.fold(None, |acc: Option<Window>, f| {
        Some(match acc {
            None => Window {
                start: f.start,
                end: f.end,
            },
            Some(w) => Window {
                start: w.start.min(f.start),
                end: w.end.max(f.end),
            },
        })
    })
}

fn mean_latency_ms<'a>(flows: impl Iterator<Item = &'a FlowRecord>) -> Option<f64> {
    let (n, total) = flows
        .filter(|f| !f.is_failed())
        .fold((0u64, 0f64), |(n, t), f| (n + 1, t + f.duration().as_secs_f64() * 1e3));
    (n > 0).then(|| total / n as f64)
}

fn flow_pairs(flows: &[FlowRecord], samples: &[CaptureSample]) -> Vec<FlowPairReport> {
    let mut pairs: BTreeMap<(String, String), (ServiceClass, Ipv4Addr, Ipv4Addr, Vec<&FlowRecord>)> =
        BTreeMap::new();
    for f in flows {
        pairs
            .entry((f.src.clone(), f.dst.clone()))
            .or_insert_with(|| (f.class, f.src_addr, f.dst_addr, Vec::new()))
            .3
            .push(f);
    }

    pairs
        .into_iter()
        .map(|((src, dst), (class, src_addr, dst_addr, records))| {
            // 请求/响应两个方向都算作这一对流
            let observed_bytes = samples
                .iter()
                .filter(|s| {
                    s.last_hop
                        && ((s.src == src_addr && s.dst == dst_addr)
                            || (s.src == dst_addr && s.dst == src_addr))
                })
                .map(|s| s.bytes)
                .sum();
            FlowPairReport {
                class,
                src,
                dst,
                flows: records.len(),
                failed_flows: records.iter().filter(|f| f.is_failed()).count(),
                requested_bytes: records.iter().map(|f| f.requested_bytes).sum(),
                transferred_bytes: records.iter().map(|f| f.bytes).sum(),
                observed_bytes,
                mean_latency_ms: mean_latency_ms(records.iter().copied()),
            }
        })
        .collect()
}

fn host_traffic(flows: &[FlowRecord], samples: &[CaptureSample]) -> BTreeMap<String, HostTraffic> {
    let mut names: BTreeMap<Ipv4Addr, &str> = BTreeMap::new();
    for f in flows {
        names.insert(f.src_addr, &f.src);
        names.insert(f.dst_addr, &f.dst);
    }

    let mut hosts: BTreeMap<String, HostTraffic> = BTreeMap::new();
    for s in samples.iter().filter(|s| s.last_hop) {
        if let Some(name) = names.get(&s.src) {
            hosts.entry(name.to_string()).or_default().sent_bytes += s.bytes;
        }
        if let Some(name) = names.get(&s.dst) {
            hosts.entry(name.to_string()).or_default().received_bytes += s.bytes;
        }
    }
    hosts
}

fn protocol_histogram(samples: &[CaptureSample]) -> BTreeMap<Protocol, ProtocolShare> {
    let mut counts: BTreeMap<Protocol, u64> = BTreeMap::new();
    for s in samples {
        *counts.entry(s.protocol).or_insert(0) += 1;
    }
    let total = samples.len() as f64;
    counts
        .into_iter()
        .map(|(p, count)| {
            (
                p,
                ProtocolShare {
                    count,
                    fraction: count as f64 / total,
                },
            )
        })
        .collect()
}
