//! 网络拓扑
//!
//! 由声明式描述构建不可变的主机/交换机/链路图，并为每台主机分配所属类别子网中的地址。

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tracing::{debug, info};

use super::addressing::{AddressPlan, MAX_HOSTS_PER_SUBNET};
use super::id::{HostId, LinkId, NodeId, SwitchId};
use super::link::Link;
use super::node::{Host, Switch};
use crate::config::{LinkPropsSpec, TopologySpec};
use crate::error::ConfigError;
use crate::qos::ServiceClass;

/// 网络拓扑
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    hosts: Vec<Host>,
    switches: Vec<Switch>,
    links: Vec<Link>,
    plan: AddressPlan,
    gateways: BTreeMap<ServiceClass, SwitchId>,
}

impl Topology {
    /// Validate `spec` and build the graph. `classes` fixes the class order
    /// used by the addressing plan.
    #[tracing::instrument(skip_all, fields(switches = spec.switches.len(), groups = spec.host_groups.len()))]
    pub fn build(spec: &TopologySpec, classes: &[ServiceClass]) -> Result<Self, ConfigError> {
        if spec.switches.is_empty() {
            return Err(ConfigError::NoSwitches);
        }

        let mut switches = Vec::with_capacity(spec.switches.len());
        let mut by_name: BTreeMap<&str, SwitchId> = BTreeMap::new();
        for name in &spec.switches {
            let id = SwitchId(switches.len());
            if by_name.insert(name.as_str(), id).is_some() {
                return Err(ConfigError::DuplicateSwitch(name.clone()));
            }
            switches.push(Switch::new(id, name.as_str()));
        }
        let lookup = |name: &str| {
            by_name
                .get(name)
                .copied()
                .ok_or_else(|| ConfigError::UnknownSwitch(name.to_string()))
        };

        for group in &spec.host_groups {
            if !classes.contains(&group.class) {
                return Err(ConfigError::UnpolicedClass(group.class));
            }
            if group.count == 0 {
                return Err(ConfigError::ZeroHosts(group.class));
            }
        }

        let plan = AddressPlan::new(classes);
        let mut gateways = BTreeMap::new();
        for &class in classes {
            let groups: Vec<_> = spec
                .host_groups
                .iter()
                .filter(|g| g.class == class)
                .collect();
            let count: usize = groups.iter().map(|g| g.count).sum();
            if count == 0 {
                return Err(ConfigError::ZeroHosts(class));
            }
            if count > MAX_HOSTS_PER_SUBNET {
                return Err(ConfigError::PoolExhausted {
                    class,
                    count,
                    max: MAX_HOSTS_PER_SUBNET,
                });
            }
            let names: BTreeSet<&str> = groups.iter().map(|g| g.switch.as_str()).collect();
            if names.len() > 1 {
                return Err(ConfigError::SplitSubnet {
                    class,
                    switches: names.into_iter().map(str::to_string).collect(),
                });
            }
            gateways.insert(class, lookup(&groups[0].switch)?);
        }

        let mut hosts = Vec::new();
        let mut links = Vec::new();
        let mut per_class: BTreeMap<ServiceClass, usize> = BTreeMap::new();
        for group in &spec.host_groups {
            let switch = lookup(&group.switch)?;
            let subnet = plan
                .subnet(group.class)
                .ok_or(ConfigError::UnpolicedClass(group.class))?;
            for _ in 0..group.count {
                let id = HostId(hosts.len());
                let name = format!("h{}", id.0 + 1);
                let index = per_class.entry(group.class).or_insert(0);
                let addr = subnet.host(*index).ok_or(ConfigError::PoolExhausted {
                    class: group.class,
                    count: *index + 1,
                    max: MAX_HOSTS_PER_SUBNET,
                })?;
                *index += 1;

                let link_name = format!("{}-{}", name, group.switch);
                let (bandwidth_bps, delay, loss) = validate_props(&link_name, &group.link)?;
                let link_id = LinkId(links.len());
                links.push(Link::new(
                    link_id,
                    link_name,
                    NodeId::Host(id),
                    NodeId::Switch(switch),
                    bandwidth_bps,
                    delay,
                    loss,
                ));
                switches[switch.0].attach(NodeId::Host(id), link_id);

                debug!(host = %name, %addr, class = %group.class, switch = %group.switch, "添加主机");
                hosts.push(Host {
                    id,
                    name,
                    class: group.class,
                    addr,
                    switch,
                    link: link_id,
                    rate_bps: bandwidth_bps,
                });
            }
        }

        let mut seen: BTreeSet<(SwitchId, SwitchId)> = BTreeSet::new();
        for spec_link in &spec.links {
            let link_name = format!("{}-{}", spec_link.a, spec_link.b);
            let a = lookup(&spec_link.a)?;
            let b = lookup(&spec_link.b)?;
            if a == b {
                return Err(ConfigError::SelfLoop(link_name));
            }
            if !seen.insert((a.min(b), a.max(b))) {
                return Err(ConfigError::DuplicateLink(link_name));
            }
            let (bandwidth_bps, delay, loss) = validate_props(&link_name, &spec_link.props)?;
            let link_id = LinkId(links.len());
            links.push(Link::new(
                link_id,
                link_name,
                NodeId::Switch(a),
                NodeId::Switch(b),
                bandwidth_bps,
                delay,
                loss,
            ));
            switches[a.0].attach(NodeId::Switch(b), link_id);
            switches[b.0].attach(NodeId::Switch(a), link_id);
        }

        info!(
            hosts = hosts.len(),
            switches = switches.len(),
            links = links.len(),
            "✅ 拓扑构建完成"
        );
        Ok(Self {
            hosts,
            switches,
            links,
            plan,
            gateways,
        })
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn switches(&self) -> &[Switch] {
        &self.switches
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn host(&self, id: HostId) -> &Host {
        &self.hosts[id.0]
    }

    pub fn switch(&self, id: SwitchId) -> &Switch {
        &self.switches[id.0]
    }

    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id.0]
    }

    pub fn host_by_name(&self, name: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.name == name)
    }

    pub fn switch_by_name(&self, name: &str) -> Option<&Switch> {
        self.switches.iter().find(|s| s.name == name)
    }

    pub fn address_plan(&self) -> &AddressPlan {
        &self.plan
    }

    /// Gateway switch of a class's subnet.
    pub fn gateway(&self, class: ServiceClass) -> Option<SwitchId> {
        self.gateways.get(&class).copied()
    }

    /// Link directly connecting two switches.
    pub fn switch_link(&self, a: SwitchId, b: SwitchId) -> Option<LinkId> {
        self.switches
            .get(a.0)?
            .neighbor_switches()
            .find(|&(n, _)| n == b)
            .map(|(_, link)| link)
    }
}

fn validate_props(link: &str, props: &LinkPropsSpec) -> Result<(u64, Duration, f64), ConfigError> {
    let bandwidth_bps = if props.bandwidth_mbps.is_finite() {
        (props.bandwidth_mbps * 1e6).round()
    } else {
        0.0
    };
    if bandwidth_bps < 1.0 {
        return Err(ConfigError::NonPositiveBandwidth {
            link: link.to_string(),
            bandwidth_mbps: props.bandwidth_mbps,
        });
    }
    if !props.delay_ms.is_finite() || props.delay_ms < 0.0 {
        return Err(ConfigError::InvalidDelay {
            link: link.to_string(),
            delay_ms: props.delay_ms,
        });
    }
    if !(0.0..=1.0).contains(&props.loss) {
        return Err(ConfigError::LossOutOfRange {
            link: link.to_string(),
            loss: props.loss,
        });
    }
    Ok((
        bandwidth_bps as u64,
        Duration::from_secs_f64(props.delay_ms / 1e3),
        props.loss,
    ))
}
