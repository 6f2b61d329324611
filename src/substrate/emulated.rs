//! In-process emulated substrate.
//!
//! A transfer occupies every link on its path for
//! `bytes × 8 / bottleneck + Σ delay`, where the bottleneck is the smallest
//! per-flow share the class shaper grants on any of those links. Loss is
//! applied as an expected value: TCP keeps every byte but slows down by the
//! retransmitted fraction, UDP and ICMP deliver fewer bytes.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use super::{Delivery, PacketMeta, Substrate, Transfer};
use crate::error::{FlowError, SubstrateError};
use crate::net::{Host, Link, LinkId, Route, SwitchId, serialization_time};
use crate::qos::{LinkShaper, QueueConfig, ServiceClass};
use crate::time::{Clock, Timestamp};
use crate::traffic::Protocol;

/// Floor for the per-flow rate so a saturated link still makes progress.
pub const MIN_FLOW_RATE_BPS: u64 = 8_000;

/// Take a host off the network `after_ms` into the experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFault {
    pub host: String,
    pub after_ms: u64,
}

impl HostFault {
    pub fn new(host: impl Into<String>, after_ms: u64) -> Self {
        Self {
            host: host.into(),
            after_ms,
        }
    }
}

#[derive(Debug)]
struct LinkState {
    link: Link,
    shaper: LinkShaper,
    /// class -> transfers currently on the link
    active: BTreeMap<ServiceClass, usize>,
}

impl LinkState {
    fn flow_rate(&self, class: ServiceClass) -> u64 {
        let classes: Vec<ServiceClass> = self.active.keys().copied().collect();
        let rates = self.shaper.rates(&classes);
        let sharing = self.active.get(&class).copied().unwrap_or(1).max(1) as u64;
        rates.get(&class).copied().unwrap_or(0) / sharing
    }
}

#[derive(Debug, Default)]
struct State {
    links: BTreeMap<LinkId, LinkState>,
    /// switch -> (neighbor switch -> link), ascending
    adjacency: BTreeMap<SwitchId, BTreeMap<SwitchId, LinkId>>,
    routes: BTreeMap<(ServiceClass, ServiceClass), Vec<SwitchId>>,
    taps: BTreeMap<LinkId, Vec<Sender<PacketMeta>>>,
}

impl State {
    fn switch_path(&self, src: &Host, dst: &Host) -> Option<Vec<SwitchId>> {
        match self.routes.get(&(src.class, dst.class)) {
            Some(hops) => Some(hops.clone()),
            None => self.tree_path(src.switch, dst.switch),
        }
    }

    /// Path inside the spanning tree rooted at the lowest switch id: the only
    /// forwarding a standalone L2 fabric offers without installed routes.
    fn tree_path(&self, from: SwitchId, to: SwitchId) -> Option<Vec<SwitchId>> {
        let root = *self.adjacency.keys().next()?;
        let mut parent: BTreeMap<SwitchId, Option<SwitchId>> = BTreeMap::new();
        parent.insert(root, None);
        let mut queue = VecDeque::from([root]);
        while let Some(u) = queue.pop_front() {
            for &v in self.adjacency.get(&u).into_iter().flat_map(BTreeMap::keys) {
                if !parent.contains_key(&v) {
                    parent.insert(v, Some(u));
                    queue.push_back(v);
                }
            }
        }

        let ancestors = |mut n: SwitchId| -> Option<Vec<SwitchId>> {
            let mut chain = vec![n];
            while let Some(p) = *parent.get(&n)? {
                chain.push(p);
                n = p;
            }
            Some(chain)
        };
        let up = ancestors(from)?;
        let down = ancestors(to)?;
        let meet = up.iter().position(|n| down.contains(n))?;
        let meet_in_down = down.iter().position(|n| *n == up[meet])?;
        let mut path: Vec<SwitchId> = up[..=meet].to_vec();
        path.extend(down[..meet_in_down].iter().rev());
        Some(path)
    }

    fn path_links(&self, src: &Host, dst: &Host) -> Option<Vec<LinkId>> {
        let hops = self.switch_path(src, dst)?;
        if hops.first() != Some(&src.switch) || hops.last() != Some(&dst.switch) {
            return None;
        }
        let mut links = Vec::with_capacity(hops.len() + 1);
        links.push(src.link);
        for w in hops.windows(2) {
            links.push(*self.adjacency.get(&w[0])?.get(&w[1])?);
        }
        links.push(dst.link);
        links
            .iter()
            .all(|id| self.links.contains_key(id))
            .then_some(links)
    }
}

pub struct EmulatedSubstrate {
    clock: Arc<dyn Clock>,
    faults: Vec<HostFault>,
    state: Mutex<State>,
}

impl EmulatedSubstrate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            faults: Vec::new(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_faults(mut self, faults: Vec<HostFault>) -> Self {
        self.faults = faults;
        self
    }

    fn check_up(&self, host: &Host, now: Timestamp) -> Result<(), FlowError> {
        let down = self
            .faults
            .iter()
            .any(|f| f.host == host.name && now >= Timestamp::from_millis(f.after_ms));
        if down {
            return Err(FlowError::HostUnreachable {
                host: host.name.clone(),
            });
        }
        Ok(())
    }

    /// Queue configs currently installed on `link`.
    pub fn installed_queues(&self, link: LinkId) -> Vec<QueueConfig> {
        self.state
            .lock()
            .links
            .get(&link)
            .map(|l| l.shaper.queues().to_vec())
            .unwrap_or_default()
    }

    pub fn installed_routes(&self) -> usize {
        self.state.lock().routes.len()
    }

    /// Links a transfer between the two hosts would traverse right now.
    pub fn resolve_path(&self, src: &Host, dst: &Host) -> Option<Vec<LinkId>> {
        self.state.lock().path_links(src, dst)
    }
}

impl Substrate for EmulatedSubstrate {
    fn create_link(&self, link: &Link) -> Result<(), SubstrateError> {
        let mut st = self.state.lock();
        if st.links.contains_key(&link.id) {
            return Err(SubstrateError::LinkExists(link.id));
        }
        let switches = link.switches();
        if let [a, b] = switches.as_slice() {
            st.adjacency.entry(*a).or_default().insert(*b, link.id);
            st.adjacency.entry(*b).or_default().insert(*a, link.id);
        } else {
            for s in switches {
                st.adjacency.entry(s).or_default();
            }
        }
        st.links.insert(
            link.id,
            LinkState {
                link: link.clone(),
                shaper: LinkShaper::new(link.bandwidth_bps),
                active: BTreeMap::new(),
            },
        );
        debug!(link = %link.name, bandwidth_bps = link.bandwidth_bps, "link created");
        Ok(())
    }

    fn install_queue(&self, link: LinkId, queue: &QueueConfig) -> Result<(), SubstrateError> {
        let mut st = self.state.lock();
        let state = st
            .links
            .get_mut(&link)
            .ok_or(SubstrateError::UnknownLink(link))?;
        state.shaper.install(queue.clone());
        debug!(
            link = %state.link.name,
            class = %queue.class,
            handle = %queue.handle(),
            min_rate_bps = queue.min_rate_bps,
            "queue installed"
        );
        Ok(())
    }

    fn install_route(&self, route: &Route) -> Result<(), SubstrateError> {
        let invalid = |reason: String| SubstrateError::InvalidRoute {
            src: route.src,
            dst: route.dst,
            reason,
        };
        let mut st = self.state.lock();
        if route.hops.is_empty() {
            return Err(invalid("route has no hops".into()));
        }
        for w in route.hops.windows(2) {
            let linked = st
                .adjacency
                .get(&w[0])
                .is_some_and(|n| n.contains_key(&w[1]));
            if !linked {
                return Err(invalid(format!("no link between {:?} and {:?}", w[0], w[1])));
            }
        }
        st.routes
            .insert((route.src.class, route.dst.class), route.hops.clone());
        Ok(())
    }

    fn send_traffic(
        &self,
        src: &Host,
        dst: &Host,
        transfer: &Transfer,
    ) -> Result<Delivery, FlowError> {
        let now = self.clock.now();
        self.check_up(src, now)?;
        self.check_up(dst, now)?;

        let (path, rate, delay, loss) = {
            let mut st = self.state.lock();
            let path = st.path_links(src, dst).ok_or_else(|| FlowError::NoPath {
                src: src.name.clone(),
                dst: dst.name.clone(),
            })?;
            for id in &path {
                if let Some(l) = st.links.get_mut(id) {
                    *l.active.entry(transfer.class).or_insert(0) += 1;
                }
            }
            let mut rate = u64::MAX;
            let mut delay = Duration::ZERO;
            let mut keep = 1.0_f64;
            for l in path.iter().filter_map(|id| st.links.get(id)) {
                rate = rate.min(l.flow_rate(transfer.class));
                delay += l.link.delay;
                keep *= 1.0 - l.link.loss;
            }
            (path, rate.max(MIN_FLOW_RATE_BPS), delay, 1.0 - keep)
        };

        let (delivered, effective_rate) = match transfer.protocol {
            Protocol::Tcp => (
                transfer.bytes,
                ((rate as f64) * (1.0 - loss)).max(MIN_FLOW_RATE_BPS as f64) as u64,
            ),
            Protocol::Udp | Protocol::Icmp | Protocol::Other => (
                ((transfer.bytes as f64) * (1.0 - loss)).round() as u64,
                rate,
            ),
        };
        let elapsed = serialization_time(transfer.bytes, effective_rate) + delay;
        trace!(
            flow_id = transfer.flow_id,
            bytes = transfer.bytes,
            rate_bps = effective_rate,
            elapsed_us = elapsed.as_micros() as u64,
            "transfer scheduled"
        );
        self.clock.sleep(elapsed);

        let ts = self.clock.now();
        let mut st = self.state.lock();
        for id in &path {
            if let Some(l) = st.links.get_mut(id) {
                if let Some(n) = l.active.get_mut(&transfer.class) {
                    *n -= 1;
                    if *n == 0 {
                        l.active.remove(&transfer.class);
                    }
                }
            }
            if let Some(taps) = st.taps.get_mut(id) {
                let meta = PacketMeta {
                    ts,
                    link: *id,
                    src: src.addr,
                    dst: dst.addr,
                    protocol: transfer.protocol,
                    bytes: delivered,
                    class: Some(transfer.class),
                };
                taps.retain(|tap| tap.send(meta.clone()).is_ok());
            }
        }
        Ok(Delivery {
            bytes: delivered,
            elapsed,
        })
    }

    fn capture_packets(&self, link: LinkId) -> Result<Receiver<PacketMeta>, SubstrateError> {
        let mut st = self.state.lock();
        if !st.links.contains_key(&link) {
            return Err(SubstrateError::UnknownLink(link));
        }
        let (tx, rx) = unbounded();
        st.taps.entry(link).or_default().push(tx);
        Ok(rx)
    }

    fn teardown(&self) {
        let mut st = self.state.lock();
        for l in st.links.values_mut() {
            l.shaper.clear();
            l.active.clear();
        }
        st.routes.clear();
        st.taps.clear();
        info!(links = st.links.len(), "substrate torn down");
    }
}
