mod config;
mod emulated;
mod policy;
mod shaper;
mod time;

use crate::config::{ExperimentConfig, HostGroupSpec, LinkPropsSpec, LinkSpec, TopologySpec};
use crate::net::{RouteTable, StaticRouter, Topology};
use crate::qos::ServiceClass;
use crate::traffic::TrafficPlan;

/// Default experiment: topology, routes and resolved plan.
pub(crate) fn default_network() -> (ExperimentConfig, Topology, RouteTable, TrafficPlan) {
    let cfg = ExperimentConfig::default();
    let topo = Topology::build(&cfg.topology, &cfg.class_order()).unwrap();
    let routes = StaticRouter::compute_routes(&topo).unwrap();
    let plan = TrafficPlan::resolve(&cfg.policy_set(), &topo, cfg.seed).unwrap();
    (cfg, topo, routes, plan)
}

pub(crate) fn group(class: ServiceClass, count: usize, switch: &str, mbps: f64) -> HostGroupSpec {
    HostGroupSpec {
        class,
        count,
        switch: switch.into(),
        link: LinkPropsSpec::new(mbps, 1.0, 0.0),
    }
}

pub(crate) fn switch_link(a: &str, b: &str, mbps: f64) -> LinkSpec {
    LinkSpec {
        a: a.into(),
        b: b.into(),
        props: LinkPropsSpec::new(mbps, 1.0, 0.0),
    }
}

pub(crate) fn topology_spec(
    switches: &[&str],
    host_groups: Vec<HostGroupSpec>,
    links: Vec<LinkSpec>,
) -> TopologySpec {
    TopologySpec {
        switches: switches.iter().map(|s| s.to_string()).collect(),
        host_groups,
        links,
    }
}
