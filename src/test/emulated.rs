use std::fs;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::default_network;
use crate::error::{Error, FlowError, SubstrateError};
use crate::net::{LinkId, Route, Topology};
use crate::qos::ServiceClass;
use crate::substrate::{
    CaptureSession, EmulatedSubstrate, HostFault, Substrate, Transfer, read_capture_file,
};
use crate::time::{Clock, ManualClock, Timestamp};
use crate::traffic::Protocol;

fn substrate_with_links(topo: &Topology) -> (Arc<ManualClock>, EmulatedSubstrate) {
    let clock = Arc::new(ManualClock::new());
    let substrate = EmulatedSubstrate::new(clock.clone());
    for link in topo.links() {
        substrate.create_link(link).unwrap();
    }
    (clock, substrate)
}

fn transfer(class: ServiceClass, protocol: Protocol, bytes: u64) -> Transfer {
    Transfer {
        flow_id: 1,
        class,
        protocol,
        bytes,
    }
}

fn link_names(topo: &Topology, links: &[LinkId]) -> Vec<String> {
    links.iter().map(|&l| topo.link(l).name.clone()).collect()
}

#[test]
fn transfer_time_is_serialization_plus_delay() {
    let (_, topo, _, _) = default_network();
    let (clock, substrate) = substrate_with_links(&topo);
    let h1 = topo.host_by_name("h1").unwrap();
    let h2 = topo.host_by_name("h2").unwrap();

    let delivery = substrate
        .send_traffic(h1, h2, &transfer(ServiceClass::Web, Protocol::Tcp, 1_000))
        .unwrap();
    // 8000 bit at 100 Mbit/s = 80 us, plus 1 ms per access link
    assert_eq!(delivery.elapsed, Duration::from_micros(2_080));
    assert_eq!(delivery.bytes, 1_000);
    assert_eq!(clock.now(), Timestamp::from_micros(2_080));
}

#[test]
fn installed_route_wins_over_spanning_tree() {
    let (_, topo, routes, _) = default_network();
    let (_, substrate) = substrate_with_links(&topo);
    let h3 = topo.host_by_name("h3").unwrap();
    let h5 = topo.host_by_name("h5").unwrap();

    // no routes: tree rooted at s1 has edges s1-s2 and s1-s3
    let tree = substrate.resolve_path(h3, h5).unwrap();
    assert_eq!(link_names(&topo, &tree), ["h3-s2", "s1-s2", "s1-s3", "h5-s3"]);

    for route in routes.routes() {
        substrate.install_route(route).unwrap();
    }
    assert_eq!(substrate.installed_routes(), 9);
    let routed = substrate.resolve_path(h3, h5).unwrap();
    assert_eq!(link_names(&topo, &routed), ["h3-s2", "s2-s3", "h5-s3"]);
}

#[test]
fn lossy_link_drops_datagram_bytes_but_not_tcp_bytes() {
    let (_, topo, routes, _) = default_network();
    let (_, substrate) = substrate_with_links(&topo);
    for route in routes.routes() {
        substrate.install_route(route).unwrap();
    }
    let h3 = topo.host_by_name("h3").unwrap();
    let h5 = topo.host_by_name("h5").unwrap();

    // s2-s3 loses 0.1%
    let udp = substrate
        .send_traffic(h3, h5, &transfer(ServiceClass::Video, Protocol::Udp, 100_000))
        .unwrap();
    assert_eq!(udp.bytes, 99_900);

    let tcp = substrate
        .send_traffic(h3, h5, &transfer(ServiceClass::Video, Protocol::Tcp, 100_000))
        .unwrap();
    assert_eq!(tcp.bytes, 100_000);
    assert!(tcp.elapsed > udp.elapsed);
}

#[test]
fn faulted_host_is_unreachable_after_its_deadline() {
    let (_, topo, _, _) = default_network();
    let clock = Arc::new(ManualClock::new());
    let substrate =
        EmulatedSubstrate::new(clock.clone()).with_faults(vec![HostFault::new("h6", 1_000)]);
    for link in topo.links() {
        substrate.create_link(link).unwrap();
    }
    let h5 = topo.host_by_name("h5").unwrap();
    let h6 = topo.host_by_name("h6").unwrap();
    let t = transfer(ServiceClass::Iot, Protocol::Icmp, 100);

    assert!(substrate.send_traffic(h5, h6, &t).is_ok());
    clock.sleep(Duration::from_secs(1));
    assert_eq!(
        substrate.send_traffic(h5, h6, &t).unwrap_err(),
        FlowError::HostUnreachable { host: "h6".into() }
    );
    assert!(matches!(
        substrate.send_traffic(h6, h5, &t),
        Err(FlowError::HostUnreachable { .. })
    ));
}

#[test]
fn missing_link_means_no_path() {
    let (_, topo, _, _) = default_network();
    let clock = Arc::new(ManualClock::new());
    let substrate = EmulatedSubstrate::new(clock);
    let h1 = topo.host(topo.host_by_name("h1").unwrap().id);
    substrate.create_link(topo.link(h1.link)).unwrap();
    let h2 = topo.host_by_name("h2").unwrap();
    assert!(matches!(
        substrate.send_traffic(h1, h2, &transfer(ServiceClass::Web, Protocol::Tcp, 10)),
        Err(FlowError::NoPath { .. })
    ));
}

#[test]
fn capture_sees_every_link_on_the_path_until_teardown() {
    let (_, topo, routes, _) = default_network();
    let (_, substrate) = substrate_with_links(&topo);
    for route in routes.routes() {
        substrate.install_route(route).unwrap();
    }
    let h1 = topo.host_by_name("h1").unwrap();
    let h3 = topo.host_by_name("h3").unwrap();
    let taps: Vec<_> = topo
        .links()
        .iter()
        .map(|l| (l.id, substrate.capture_packets(l.id).unwrap()))
        .collect();

    substrate
        .send_traffic(h1, h3, &transfer(ServiceClass::Web, Protocol::Tcp, 5_000))
        .unwrap();
    substrate.teardown();

    let seen: Vec<String> = taps
        .iter()
        .filter_map(|(id, rx)| {
            let got: Vec<_> = rx.iter().collect();
            (!got.is_empty()).then(|| {
                assert_eq!(got.len(), 1);
                assert_eq!(got[0].bytes, 5_000);
                assert_eq!((got[0].src, got[0].dst), (h1.addr, h3.addr));
                assert_eq!(got[0].class, Some(ServiceClass::Web));
                topo.link(*id).name.clone()
            })
        })
        .collect();
    assert_eq!(seen, ["h1-s1", "h3-s2", "s1-s2"]);
}

#[test]
fn installation_errors() {
    let (_, topo, _, _) = default_network();
    let (_, substrate) = substrate_with_links(&topo);
    assert_eq!(
        substrate.create_link(&topo.links()[0]),
        Err(SubstrateError::LinkExists(LinkId(0)))
    );
    assert!(matches!(
        substrate.capture_packets(LinkId(99)),
        Err(SubstrateError::UnknownLink(LinkId(99)))
    ));

    let plan = topo.address_plan();
    let web = *plan.subnet(ServiceClass::Web).unwrap();
    let video = *plan.subnet(ServiceClass::Video).unwrap();
    let s1 = topo.switch_by_name("s1").unwrap().id;
    let bogus = Route {
        src: web,
        dst: video,
        hops: vec![s1, crate::net::SwitchId(7)],
    };
    assert!(matches!(
        substrate.install_route(&bogus),
        Err(SubstrateError::InvalidRoute { .. })
    ));
}

#[test]
fn queues_are_cleared_on_teardown() {
    let (cfg, topo, routes, plan) = default_network();
    let (_, substrate) = substrate_with_links(&topo);
    let compiled = crate::qos::PolicyEngine::new(&topo, &routes)
        .compile(&cfg.policy_set(), &plan)
        .unwrap();
    for (link, queues) in compiled.iter() {
        for q in queues {
            substrate.install_queue(link, q).unwrap();
        }
    }
    let h1 = topo.host_by_name("h1").unwrap();
    assert_eq!(substrate.installed_queues(h1.link).len(), 1);
    substrate.teardown();
    assert!(substrate.installed_queues(h1.link).is_empty());
    assert_eq!(substrate.installed_routes(), 0);
}

fn routed_substrate(topo: &Topology, routes: &crate::net::RouteTable) -> EmulatedSubstrate {
    let (_, substrate) = substrate_with_links(topo);
    for route in routes.routes() {
        substrate.install_route(route).unwrap();
    }
    substrate
}

#[test]
fn capture_keeps_the_sender_class_across_subnets() {
    let (_, topo, routes, _) = default_network();
    let substrate = routed_substrate(&topo, &routes);
    let session = CaptureSession::start(&substrate, &topo, None).unwrap();
    let h1 = topo.host_by_name("h1").unwrap();
    let h3 = topo.host_by_name("h3").unwrap();

    // web response leaving a video host
    substrate
        .send_traffic(h3, h1, &transfer(ServiceClass::Web, Protocol::Tcp, 2_000))
        .unwrap();
    substrate.teardown();

    let samples = session.finish().unwrap();
    assert_eq!(samples.len(), 3);
    assert!(samples.iter().all(|s| s.class == Some(ServiceClass::Web)));
    let last: Vec<&str> = samples
        .iter()
        .filter(|s| s.last_hop)
        .map(|s| s.link.as_str())
        .collect();
    assert_eq!(last, ["h1-s1"]);
}

#[test]
fn capture_failure_is_reported_after_every_writer_finished() {
    let (_, topo, routes, _) = default_network();
    let substrate = routed_substrate(&topo, &routes);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("qosim-capture-{}-{nanos}", std::process::id()));
    // h1-s1 cannot open its capture file
    fs::create_dir_all(dir.join("h1-s1.jsonl")).unwrap();

    let session = CaptureSession::start(&substrate, &topo, Some(&dir)).unwrap();
    let h3 = topo.host_by_name("h3").unwrap();
    let h4 = topo.host_by_name("h4").unwrap();
    substrate
        .send_traffic(h3, h4, &transfer(ServiceClass::Video, Protocol::Udp, 1_000))
        .unwrap();
    substrate.teardown();

    let err = session.finish().unwrap_err();
    assert!(matches!(&err, Error::Io { path, .. } if path.ends_with("h1-s1.jsonl")));
    // the healthy writers were flushed before finish returned
    for link in ["h3-s2", "h4-s2"] {
        let got = read_capture_file(&dir.join(format!("{link}.jsonl"))).unwrap();
        assert_eq!(got.len(), 1, "{link}");
    }

    fs::remove_dir_all(&dir).ok();
}
