use super::{default_network, group, switch_link, topology_spec};
use crate::config::ExperimentConfig;
use crate::net::{StaticRouter, Topology};
use crate::qos::{ClassPolicy, PolicyEngine, PolicySet, ServiceClass};
use crate::traffic::{FlowSpec, TrafficPattern, TrafficPlan};

fn policy(class: ServiceClass, share: f64, priority: u32, flow: (&str, &str)) -> ClassPolicy {
    let pattern = match class {
        ServiceClass::Web => TrafficPattern::web(),
        ServiceClass::Video => TrafficPattern::video(),
        ServiceClass::Iot => TrafficPattern::iot(),
    };
    ClassPolicy {
        class,
        share,
        priority,
        ceil_share: None,
        pattern,
        protocol: None,
        flows: vec![FlowSpec::new(flow.0, flow.1)],
    }
}

/// Every class crosses the 100 Mbit/s s1-s2 link:
/// web h1 -> h5, video h3 -> h6, iot h7 -> h2.
fn shared_link_setup(allow: bool) -> (Topology, crate::net::RouteTable, PolicySet, TrafficPlan) {
    let spec = topology_spec(
        &["s1", "s2"],
        vec![
            group(ServiceClass::Web, 2, "s1", 1000.0),
            group(ServiceClass::Video, 2, "s1", 1000.0),
            group(ServiceClass::Iot, 3, "s2", 1000.0),
        ],
        vec![switch_link("s1", "s2", 100.0)],
    );
    let mut set = PolicySet::new(vec![
        policy(ServiceClass::Web, 0.8, 1, ("h1", "h5")),
        policy(ServiceClass::Video, 0.8, 2, ("h3", "h6")),
        policy(ServiceClass::Iot, 0.5, 3, ("h7", "h2")),
    ]);
    set.allow_oversubscription = allow;
    let topo = Topology::build(&spec, &set.class_order()).unwrap();
    let routes = StaticRouter::compute_routes(&topo).unwrap();
    let plan = TrafficPlan::resolve(&set, &topo, 7).unwrap();
    (topo, routes, set, plan)
}

#[test]
fn default_experiment_compiles_with_scoped_links() {
    let (cfg, topo, routes, plan) = default_network();
    let compiled = PolicyEngine::new(&topo, &routes)
        .compile(&cfg.policy_set(), &plan)
        .unwrap();

    // 每个类别只在自己用到的接入链路上有队列
    let h1 = topo.host_by_name("h1").unwrap();
    let queues = compiled.queues(h1.link);
    assert_eq!(queues.len(), 1);
    assert_eq!(queues[0].class, ServiceClass::Web);
    assert_eq!(queues[0].min_rate_bps, 80_000_000);
    assert_eq!(queues[0].max_rate_bps, Some(100_000_000));
    assert_eq!(queues[0].handle(), "1:10");

    let h5 = topo.host_by_name("h5").unwrap();
    assert_eq!(compiled.queues(h5.link)[0].handle(), "1:30");

    let guarantees = compiled.class_guarantees();
    assert_eq!(guarantees[&ServiceClass::Web], 80_000_000);
    assert_eq!(guarantees[&ServiceClass::Video], 800_000_000);
    assert_eq!(guarantees[&ServiceClass::Iot], 50_000_000);

    for (link, qs) in compiled.iter() {
        let sum: u64 = qs.iter().map(|q| q.min_rate_bps).sum();
        assert!(sum <= topo.link(link).bandwidth_bps);
    }
}

#[test]
fn shares_on_shared_link_are_oversubscribed() {
    let (topo, routes, set, plan) = shared_link_setup(false);
    let err = PolicyEngine::new(&topo, &routes)
        .compile(&set, &plan)
        .unwrap_err();
    assert_eq!(err.link, "s1-s2");
    assert_eq!(err.capacity_bps, 100_000_000);
    assert_eq!(err.requested_bps, 210_000_000);
    assert_eq!(
        err.classes,
        [ServiceClass::Web, ServiceClass::Video, ServiceClass::Iot]
    );
}

#[test]
fn explicit_oversubscription_keeps_priority_order() {
    let (topo, routes, set, plan) = shared_link_setup(true);
    let compiled = PolicyEngine::new(&topo, &routes).compile(&set, &plan).unwrap();
    let s1 = topo.switch_by_name("s1").unwrap().id;
    let s2 = topo.switch_by_name("s2").unwrap().id;
    let shared = topo.switch_link(s1, s2).unwrap();
    let order: Vec<(ServiceClass, u32)> = compiled
        .queues(shared)
        .iter()
        .map(|q| (q.class, q.priority))
        .collect();
    assert_eq!(
        order,
        [
            (ServiceClass::Web, 1),
            (ServiceClass::Video, 2),
            (ServiceClass::Iot, 3)
        ]
    );
}

#[test]
fn equal_priority_keeps_declaration_order() {
    let (topo, routes, mut set, plan) = shared_link_setup(true);
    set.classes[0].priority = 2;
    set.classes[1].priority = 1;
    set.classes[2].priority = 1;
    let compiled = PolicyEngine::new(&topo, &routes).compile(&set, &plan).unwrap();
    let s1 = topo.switch_by_name("s1").unwrap().id;
    let s2 = topo.switch_by_name("s2").unwrap().id;
    let classes: Vec<ServiceClass> = compiled
        .queues(topo.switch_link(s1, s2).unwrap())
        .iter()
        .map(|q| q.class)
        .collect();
    assert_eq!(
        classes,
        [ServiceClass::Video, ServiceClass::Iot, ServiceClass::Web]
    );
}

#[test]
fn request_response_reserves_the_reverse_path() {
    let (topo, routes, set, plan) = shared_link_setup(true);
    let compiled = PolicyEngine::new(&topo, &routes).compile(&set, &plan).unwrap();
    let web_links = compiled.links_of(ServiceClass::Web).unwrap();
    let h5 = topo.host_by_name("h5").unwrap();
    assert!(web_links.contains(&h5.link));
    // iot is one-way: h7 -> h2 only
    let iot_links = compiled.links_of(ServiceClass::Iot).unwrap();
    assert_eq!(iot_links.len(), 3);
}

#[test]
fn compile_is_idempotent() {
    let cfg = ExperimentConfig::default();
    let (_, topo, routes, plan) = default_network();
    let engine = PolicyEngine::new(&topo, &routes);
    let a = engine.compile(&cfg.policy_set(), &plan).unwrap();
    let b = engine.compile(&cfg.policy_set(), &plan).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a.all_queues()).unwrap(),
        serde_json::to_string(&b.all_queues()).unwrap()
    );
}

#[test]
fn invalid_shares_are_config_errors() {
    let mut set = ExperimentConfig::default().policy_set();
    set.classes[0].share = 0.0;
    assert!(set.validate().is_err());

    let mut set = ExperimentConfig::default().policy_set();
    set.classes[1].ceil_share = Some(0.5);
    assert!(set.validate().is_err());

    let mut set = ExperimentConfig::default().policy_set();
    set.classes[2].class = ServiceClass::Web;
    assert!(set.validate().is_err());
}
