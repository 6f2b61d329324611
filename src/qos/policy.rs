//! QoS policy compilation.
//!
//! Turns class intent (share, priority, ceiling) into per-link queue
//! configurations. A class only receives a queue on links its flows actually
//! traverse, which is what keeps per-class guarantees from colliding on links
//! they never share.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use super::{ClassPolicy, PolicySet, QueueConfig, ServiceClass};
use crate::error::OversubscriptionError;
use crate::net::{LinkId, RouteTable, Topology};
use crate::traffic::TrafficPlan;

/// Output of [`PolicyEngine::compile`]: link -> queue configs ordered by
/// priority, ties in class declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledPolicy {
    links: BTreeMap<LinkId, Vec<QueueConfig>>,
    class_links: BTreeMap<ServiceClass, BTreeSet<LinkId>>,
}

impl CompiledPolicy {
    pub fn queues(&self, link: LinkId) -> &[QueueConfig] {
        self.links.get(&link).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (LinkId, &[QueueConfig])> {
        self.links.iter().map(|(&id, q)| (id, q.as_slice()))
    }

    /// Every queue config, link by link.
    pub fn all_queues(&self) -> Vec<QueueConfig> {
        self.links.values().flatten().cloned().collect()
    }

    pub fn links_of(&self, class: ServiceClass) -> Option<&BTreeSet<LinkId>> {
        self.class_links.get(&class)
    }

    /// End-to-end guarantee per class: the smallest min-rate along the links
    /// the class uses.
    pub fn class_guarantees(&self) -> BTreeMap<ServiceClass, u64> {
        let mut out: BTreeMap<ServiceClass, u64> = BTreeMap::new();
        for q in self.links.values().flatten() {
            out.entry(q.class)
                .and_modify(|g| *g = (*g).min(q.min_rate_bps))
                .or_insert(q.min_rate_bps);
        }
        out
    }
}

pub struct PolicyEngine<'a> {
    topology: &'a Topology,
    routes: &'a RouteTable,
}

impl<'a> PolicyEngine<'a> {
    pub fn new(topology: &'a Topology, routes: &'a RouteTable) -> Self {
        Self { topology, routes }
    }

    /// Compile `policies` for the links used by `plan`. Pure and idempotent.
    #[tracing::instrument(skip_all, fields(classes = policies.classes.len(), flows = plan.flows().len()))]
    pub fn compile(
        &self,
        policies: &PolicySet,
        plan: &TrafficPlan,
    ) -> Result<CompiledPolicy, OversubscriptionError> {
        let mut class_links = BTreeMap::new();
        let mut links: BTreeMap<LinkId, Vec<QueueConfig>> = BTreeMap::new();

        for (index, policy) in policies.classes.iter().enumerate() {
            let used = self.class_links(policy, plan);
            for &link_id in &used {
                let link = self.topology.link(link_id);
                let queue = QueueConfig {
                    link: link_id,
                    class: policy.class,
                    queue_id: 10 * (index as u16 + 1),
                    min_rate_bps: rate(policy.share, link.bandwidth_bps),
                    max_rate_bps: policy.ceil_share.map(|c| rate(c, link.bandwidth_bps)),
                    priority: policy.priority,
                };
                links.entry(link_id).or_default().push(queue);
            }
            debug!(class = %policy.class, links = used.len(), "类别使用的链路");
            class_links.insert(policy.class, used);
        }

        for (&link_id, queues) in links.iter_mut() {
            // Stable: equal ranks keep declaration order.
            queues.sort_by_key(|q| q.priority);

            let link = self.topology.link(link_id);
            let requested: u64 = queues.iter().map(|q| q.min_rate_bps).sum();
            if requested > link.bandwidth_bps {
                let err = OversubscriptionError {
                    link: link.name.clone(),
                    link_id,
                    capacity_bps: link.bandwidth_bps,
                    requested_bps: requested,
                    classes: queues.iter().map(|q| q.class).collect(),
                };
                if !policies.allow_oversubscription {
                    return Err(err);
                }
                warn!(%err, "oversubscription explicitly allowed by policy");
            }
        }

        info!(
            links = links.len(),
            queues = links.values().map(Vec::len).sum::<usize>(),
            "✅ QoS 策略编译完成"
        );
        Ok(CompiledPolicy { links, class_links })
    }

    /// Links traversed by the class's reserved flows. Request/response
    /// patterns also use the reverse route for the response.
    fn class_links(&self, policy: &ClassPolicy, plan: &TrafficPlan) -> BTreeSet<LinkId> {
        let mut used = BTreeSet::new();
        for flow in plan.reserved_flows_of(policy.class) {
            let src = self.topology.host(flow.src);
            let dst = self.topology.host(flow.dst);
            if let Some(path) = self.routes.path_links(self.topology, src, dst) {
                used.extend(path);
            }
            if flow.pattern.is_request_response() {
                if let Some(path) = self.routes.path_links(self.topology, dst, src) {
                    used.extend(path);
                }
            }
        }
        used
    }
}

fn rate(share: f64, bandwidth_bps: u64) -> u64 {
    (share * bandwidth_bps as f64).round() as u64
}
