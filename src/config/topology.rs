use serde::{Deserialize, Serialize};

use crate::qos::ServiceClass;

/// Declarative network description: switches, host groups per class and the
/// inter-switch link table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologySpec {
    pub switches: Vec<String>,
    pub host_groups: Vec<HostGroupSpec>,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostGroupSpec {
    pub class: ServiceClass,
    pub count: usize,
    pub switch: String,
    /// Access link of every host in the group.
    pub link: LinkPropsSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSpec {
    pub a: String,
    pub b: String,
    #[serde(flatten)]
    pub props: LinkPropsSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkPropsSpec {
    pub bandwidth_mbps: f64,
    #[serde(default)]
    pub delay_ms: f64,
    /// Loss probability in [0, 1].
    #[serde(default)]
    pub loss: f64,
}

impl LinkPropsSpec {
    pub fn new(bandwidth_mbps: f64, delay_ms: f64, loss: f64) -> Self {
        Self {
            bandwidth_mbps,
            delay_ms,
            loss,
        }
    }
}

impl TopologySpec {
    /// Three switches in a triangle, two hosts per class:
    ///
    /// ```text
    ///   h1,h2 (web) ── s1 ──1000M── s2 ── h3,h4 (video)
    ///                   \          /
    ///                  10M       100M
    ///                     \      /
    ///                       s3 ── h5,h6 (iot)
    /// ```
    pub fn three_switch() -> Self {
        let switch_link = |a: &str, b: &str, props: LinkPropsSpec| LinkSpec {
            a: a.to_string(),
            b: b.to_string(),
            props,
        };
        Self {
            switches: vec!["s1".into(), "s2".into(), "s3".into()],
            host_groups: vec![
                HostGroupSpec {
                    class: ServiceClass::Web,
                    count: 2,
                    switch: "s1".into(),
                    link: LinkPropsSpec::new(100.0, 1.0, 0.0),
                },
                HostGroupSpec {
                    class: ServiceClass::Video,
                    count: 2,
                    switch: "s2".into(),
                    link: LinkPropsSpec::new(1000.0, 2.0, 0.0),
                },
                HostGroupSpec {
                    class: ServiceClass::Iot,
                    count: 2,
                    switch: "s3".into(),
                    link: LinkPropsSpec::new(100.0, 5.0, 0.0),
                },
            ],
            links: vec![
                switch_link("s1", "s2", LinkPropsSpec::new(1000.0, 1.0, 0.0)),
                switch_link("s2", "s3", LinkPropsSpec::new(100.0, 10.0, 0.001)),
                switch_link("s1", "s3", LinkPropsSpec::new(10.0, 20.0, 0.005)),
            ],
        }
    }
}
