use std::time::Duration;

use crate::config::{
    ExperimentConfig, RoutingMode, DEFAULT_DURATION_SECS, DEFAULT_SEED, SCHEMA_VERSION,
};
use crate::error::ConfigError;
use crate::qos::ServiceClass;
use crate::traffic::{CrossTrafficSpec, Protocol, SizeRange, TrafficPattern};

const MINIMAL: &str = r#"
{
    "schema_version": 1,
    "classes": [
        {
            "class": "web",
            "share": 0.5,
            "priority": 1,
            "pattern": { "kind": "periodic_small_payload", "payload_bytes": { "min": 10, "max": 20 }, "interval_ms": 100 },
            "flows": [ { "src": "h1", "dst": "h2" } ]
        }
    ],
    "topology": {
        "switches": ["s1"],
        "host_groups": [
            { "class": "web", "count": 2, "switch": "s1", "link": { "bandwidth_mbps": 10 } }
        ]
    }
}
"#;

#[test]
fn default_config_is_valid() {
    let cfg = ExperimentConfig::default();
    cfg.validate().unwrap();
    assert_eq!(cfg.schema_version, SCHEMA_VERSION);
    assert_eq!(
        cfg.class_order(),
        [ServiceClass::Web, ServiceClass::Video, ServiceClass::Iot]
    );
    assert_eq!(cfg.duration(), Duration::from_secs(60));
    let cross: Vec<(&str, &str)> = cfg
        .cross_traffic
        .iter()
        .map(|c| (c.src.as_str(), c.dst.as_str()))
        .collect();
    assert_eq!(cross, [("h1", "h3"), ("h4", "h5")]);
}

#[test]
fn cross_traffic_defaults_to_tcp_at_one_to_ten_mbit() {
    let raw = MINIMAL.replace(
        r#""topology": {"#,
        r#""cross_traffic": [ { "src": "h1", "dst": "h2" } ],
    "topology": {"#,
    );
    let cfg = ExperimentConfig::from_json(&raw).unwrap();
    assert_eq!(cfg.cross_traffic, [CrossTrafficSpec::new("h1", "h2")]);
    assert_eq!(cfg.cross_traffic[0].protocol, Protocol::Tcp);
    assert_eq!(cfg.cross_traffic[0].rate_mbps, SizeRange::new(1, 10));
}

#[test]
fn minimal_json_fills_defaults() {
    let cfg = ExperimentConfig::from_json(MINIMAL).unwrap();
    assert_eq!(cfg.seed, DEFAULT_SEED);
    assert_eq!(cfg.duration_secs, DEFAULT_DURATION_SECS);
    assert_eq!(cfg.tolerance, 0.9);
    assert!(cfg.options.qos);
    assert_eq!(cfg.options.routing, RoutingMode::Static);
    assert!(!cfg.policy.allow_oversubscription);
    assert!(cfg.faults.is_empty());
    assert!(cfg.cross_traffic.is_empty());
    assert!(cfg.topology.links.is_empty());
    assert_eq!(cfg.topology.host_groups[0].link.delay_ms, 0.0);
    assert!(matches!(cfg.classes[0].pattern, TrafficPattern::PeriodicSmallPayload { .. }));
}

#[test]
fn demo_preset_runs_thirty_seconds() {
    let mut cfg = ExperimentConfig::demo();
    cfg.duration_secs = 5.0;
    assert_eq!(cfg.duration(), Duration::from_secs(30));
    assert!(cfg.options.qos);
}

#[test]
fn invalid_top_level_fields_are_rejected() {
    let raw = MINIMAL.replace(r#""schema_version": 1"#, r#""schema_version": 7"#);
    assert!(matches!(
        ExperimentConfig::from_json(&raw),
        Err(ConfigError::UnsupportedSchema { found: 7, expected: 1 })
    ));

    let mut cfg = ExperimentConfig::default();
    cfg.duration_secs = 0.0;
    assert!(matches!(cfg.validate(), Err(ConfigError::InvalidDuration(_))));
    cfg.duration_secs = f64::NAN;
    assert!(matches!(cfg.validate(), Err(ConfigError::InvalidDuration(_))));

    let mut cfg = ExperimentConfig::default();
    cfg.tolerance = 0.0;
    assert!(matches!(cfg.validate(), Err(ConfigError::InvalidTolerance(_))));

    let mut cfg = ExperimentConfig::default();
    cfg.classes[1].share = 1.5;
    assert!(matches!(
        cfg.validate(),
        Err(ConfigError::InvalidShare { class: ServiceClass::Video, .. })
    ));

    assert!(matches!(
        ExperimentConfig::from_json("{ not json"),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn experiment_name_reflects_options() {
    let cfg = ExperimentConfig::default();
    assert_eq!(cfg.experiment_name(), "qos_static");
    let cfg = cfg.with_options(false, RoutingMode::None);
    assert_eq!(cfg.experiment_name(), "no_qos_none");

    let mut named = ExperimentConfig::default();
    named.name = Some("baseline".into());
    assert_eq!(named.experiment_name(), "baseline");
}

#[test]
fn routing_mode_parses_from_cli_text() {
    assert_eq!("static".parse::<RoutingMode>(), Ok(RoutingMode::Static));
    assert_eq!("none".parse::<RoutingMode>(), Ok(RoutingMode::None));
    assert!("ospf".parse::<RoutingMode>().is_err());
    assert_eq!(RoutingMode::None.to_string(), "none");
}

#[test]
fn missing_file_is_a_read_error() {
    let err = ExperimentConfig::load(std::path::Path::new("/nonexistent/qosim.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}
