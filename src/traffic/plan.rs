use serde::{Deserialize, Serialize};

use super::{Protocol, SizeRange, TrafficPattern};
use crate::error::ConfigError;
use crate::net::{HostId, Topology};
use crate::qos::{PolicySet, ServiceClass};

/// Designated host pair for a class, by host name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSpec {
    pub src: String,
    pub dst: String,
}

impl FlowSpec {
    pub fn new(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
        }
    }
}

/// Stress traffic between hosts of different classes, iperf style: a constant
/// bitrate drawn once per run from `rate_mbps`. Tagged with the source host's
/// class; no bandwidth is reserved for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossTrafficSpec {
    pub src: String,
    pub dst: String,
    #[serde(default = "default_cross_rate")]
    pub rate_mbps: SizeRange,
    #[serde(default = "default_cross_protocol")]
    pub protocol: Protocol,
}

fn default_cross_rate() -> SizeRange {
    SizeRange::new(1, 10)
}

fn default_cross_protocol() -> Protocol {
    Protocol::Tcp
}

impl CrossTrafficSpec {
    /// TCP at 1..=10 Mbit/s.
    pub fn new(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            rate_mbps: default_cross_rate(),
            protocol: default_cross_protocol(),
        }
    }
}

const CROSS_SEED: u64 = 0xC505_5EED;

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedFlow {
    pub class: ServiceClass,
    pub src: HostId,
    pub dst: HostId,
    pub pattern: TrafficPattern,
    pub protocol: Protocol,
    /// False for cross traffic: the policy engine compiles no queue for it.
    pub reserved: bool,
}

/// Flows resolved against a topology, in class declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficPlan {
    flows: Vec<PlannedFlow>,
    seed: u64,
}

impl TrafficPlan {
    pub fn resolve(policies: &PolicySet, topo: &Topology, seed: u64) -> Result<Self, ConfigError> {
        let mut flows = Vec::new();
        for policy in &policies.classes {
            for spec in &policy.flows {
                let src = topo
                    .host_by_name(&spec.src)
                    .ok_or_else(|| ConfigError::UnknownHost(spec.src.clone()))?;
                let dst = topo
                    .host_by_name(&spec.dst)
                    .ok_or_else(|| ConfigError::UnknownHost(spec.dst.clone()))?;
                if src.id == dst.id {
                    return Err(ConfigError::LoopbackFlow {
                        class: policy.class,
                        host: src.name.clone(),
                    });
                }
                if src.class != policy.class {
                    return Err(ConfigError::FlowClassMismatch {
                        class: policy.class,
                        src: src.name.clone(),
                        dst: dst.name.clone(),
                        src_class: src.class,
                    });
                }
                flows.push(PlannedFlow {
                    class: policy.class,
                    src: src.id,
                    dst: dst.id,
                    pattern: policy.pattern.clone(),
                    protocol: policy.protocol(),
                    reserved: true,
                });
            }
        }
        Ok(Self { flows, seed })
    }

    /// Append cross traffic after the class flows. Rates are drawn from the
    /// plan seed so the same config always yields the same plan.
    pub fn with_cross_traffic(
        mut self,
        specs: &[CrossTrafficSpec],
        topo: &Topology,
    ) -> Result<Self, ConfigError> {
        let mut rng = fastrand::Rng::with_seed(self.seed ^ CROSS_SEED);
        for spec in specs {
            let src = topo
                .host_by_name(&spec.src)
                .ok_or_else(|| ConfigError::UnknownHost(spec.src.clone()))?;
            let dst = topo
                .host_by_name(&spec.dst)
                .ok_or_else(|| ConfigError::UnknownHost(spec.dst.clone()))?;
            if src.id == dst.id {
                return Err(ConfigError::LoopbackFlow {
                    class: src.class,
                    host: src.name.clone(),
                });
            }
            let range = spec.rate_mbps;
            if range.min == 0 || range.min > range.max {
                return Err(ConfigError::InvalidCrossRate {
                    src: spec.src.clone(),
                    dst: spec.dst.clone(),
                    min: range.min,
                    max: range.max,
                });
            }
            let mbps = range.sample(&mut rng);
            self.flows.push(PlannedFlow {
                class: src.class,
                src: src.id,
                dst: dst.id,
                pattern: TrafficPattern::constant_bitrate(mbps.saturating_mul(1_000_000)),
                protocol: spec.protocol,
                reserved: false,
            });
        }
        Ok(self)
    }

    pub fn flows(&self) -> &[PlannedFlow] {
        &self.flows
    }

    pub fn flows_of(&self, class: ServiceClass) -> impl Iterator<Item = &PlannedFlow> {
        self.flows.iter().filter(move |f| f.class == class)
    }

    /// Class flows that carry a reservation (cross traffic excluded).
    pub fn reserved_flows_of(&self, class: ServiceClass) -> impl Iterator<Item = &PlannedFlow> {
        self.flows_of(class).filter(|f| f.reserved)
    }

    pub fn cross_traffic(&self) -> impl Iterator<Item = &PlannedFlow> {
        self.flows.iter().filter(|f| !f.reserved)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}
