//! 实验配置
//!
//! JSON 实验描述：类别策略、拓扑、时长、容差、运行选项与故障注入。
//! 所有校验都发生在任何目录或文件创建之前。

mod topology;

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::{AnalyzerConfig, DEFAULT_TOLERANCE};
use crate::error::ConfigError;
use crate::qos::{ClassPolicy, PolicySet, ServiceClass};
use crate::substrate::HostFault;
use crate::traffic::{CrossTrafficSpec, FlowSpec, TrafficPattern};

pub use topology::{HostGroupSpec, LinkPropsSpec, LinkSpec, TopologySpec};

pub const SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_DURATION_SECS: f64 = 60.0;
/// demo 预设的固定时长
pub const DEMO_DURATION_SECS: f64 = 30.0;
pub const DEFAULT_SEED: u64 = 42;

/// 是否向底座下发静态路由
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// 安装预计算的静态路由
    #[default]
    Static,
    /// 不安装路由，由底座默认转发（生成树）
    None,
}

impl RoutingMode {
    pub fn name(self) -> &'static str {
        match self {
            RoutingMode::Static => "static",
            RoutingMode::None => "none",
        }
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RoutingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(RoutingMode::Static),
            "none" => Ok(RoutingMode::None),
            other => Err(format!("unknown routing mode {other:?} (expected static or none)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentOptions {
    /// 安装 QoS 队列
    #[serde(default = "enabled")]
    pub qos: bool,
    #[serde(default)]
    pub routing: RoutingMode,
    /// 30 秒固定时长预设
    #[serde(default)]
    pub demo: bool,
}

fn enabled() -> bool {
    true
}

impl Default for ExperimentOptions {
    fn default() -> Self {
        Self {
            qos: true,
            routing: RoutingMode::Static,
            demo: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOptions {
    #[serde(default)]
    pub allow_oversubscription: bool,
}

fn default_duration_secs() -> f64 {
    DEFAULT_DURATION_SECS
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub schema_version: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_duration_secs")]
    pub duration_secs: f64,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub options: ExperimentOptions,
    #[serde(default)]
    pub policy: PolicyOptions,
    pub classes: Vec<ClassPolicy>,
    pub topology: TopologySpec,
    /// 跨类别压力流量，不预留带宽
    #[serde(default)]
    pub cross_traffic: Vec<CrossTrafficSpec>,
    #[serde(default)]
    pub faults: Vec<HostFault>,
}

impl Default for ExperimentConfig {
    /// 三交换机拓扑，每类两台主机，Web/Video/IoT 份额 0.8/0.8/0.5，
    /// 外加 h1 -> h3（web 到 video）与 h4 -> h5（video 到 iot）两条跨交换机压力流。
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            name: None,
            seed: DEFAULT_SEED,
            duration_secs: DEFAULT_DURATION_SECS,
            tolerance: DEFAULT_TOLERANCE,
            options: ExperimentOptions::default(),
            policy: PolicyOptions::default(),
            classes: vec![
                ClassPolicy {
                    class: ServiceClass::Web,
                    share: 0.8,
                    priority: 1,
                    ceil_share: Some(1.0),
                    pattern: TrafficPattern::web(),
                    protocol: None,
                    flows: vec![FlowSpec::new("h1", "h2")],
                },
                ClassPolicy {
                    class: ServiceClass::Video,
                    share: 0.8,
                    priority: 2,
                    ceil_share: None,
                    pattern: TrafficPattern::video(),
                    protocol: None,
                    flows: vec![FlowSpec::new("h3", "h4")],
                },
                ClassPolicy {
                    class: ServiceClass::Iot,
                    share: 0.5,
                    priority: 3,
                    ceil_share: None,
                    pattern: TrafficPattern::iot(),
                    protocol: None,
                    flows: vec![FlowSpec::new("h5", "h6")],
                },
            ],
            topology: TopologySpec::three_switch(),
            cross_traffic: vec![
                CrossTrafficSpec::new("h1", "h3"),
                CrossTrafficSpec::new("h4", "h5"),
            ],
            faults: Vec::new(),
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let cfg: ExperimentConfig = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// 30 秒、启用 QoS 与静态路由的演示预设。
    pub fn demo() -> Self {
        let mut cfg = Self::default();
        cfg.options = ExperimentOptions {
            qos: true,
            routing: RoutingMode::Static,
            demo: true,
        };
        cfg
    }

    /// 与拓扑无关的校验；主机名、连通性等在构建实验时检查。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedSchema {
                found: self.schema_version,
                expected: SCHEMA_VERSION,
            });
        }
        if !(self.duration_secs.is_finite() && self.duration_secs > 0.0) {
            return Err(ConfigError::InvalidDuration(self.duration_secs));
        }
        AnalyzerConfig::new(self.tolerance)?;
        self.policy_set().validate()
    }

    pub fn duration(&self) -> Duration {
        if self.options.demo {
            Duration::from_secs_f64(DEMO_DURATION_SECS)
        } else {
            Duration::from_secs_f64(self.duration_secs)
        }
    }

    pub fn analyzer_config(&self) -> Result<AnalyzerConfig, ConfigError> {
        AnalyzerConfig::new(self.tolerance)
    }

    pub fn policy_set(&self) -> PolicySet {
        PolicySet {
            classes: self.classes.clone(),
            allow_oversubscription: self.policy.allow_oversubscription,
        }
    }

    pub fn class_order(&self) -> Vec<ServiceClass> {
        self.classes.iter().map(|c| c.class).collect()
    }

    /// 例如 `qos_static`、`no_qos_none`
    pub fn experiment_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        let qos = if self.options.qos { "qos" } else { "no_qos" };
        format!("{qos}_{}", self.options.routing)
    }

    pub fn with_options(mut self, qos: bool, routing: RoutingMode) -> Self {
        self.options.qos = qos;
        self.options.routing = routing;
        self
    }
}
