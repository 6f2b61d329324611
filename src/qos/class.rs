use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::traffic::{FlowSpec, Protocol, TrafficPattern};

/// Service class of a host and of the traffic it originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceClass {
    /// High-priority interactive request/response.
    Web,
    /// Medium-priority streaming.
    Video,
    /// Low-priority periodic telemetry.
    Iot,
}

impl ServiceClass {
    pub const ALL: [ServiceClass; 3] = [ServiceClass::Web, ServiceClass::Video, ServiceClass::Iot];

    pub fn name(self) -> &'static str {
        match self {
            ServiceClass::Web => "web",
            ServiceClass::Video => "video",
            ServiceClass::Iot => "iot",
        }
    }
}

impl fmt::Display for ServiceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// QoS intent for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassPolicy {
    pub class: ServiceClass,
    /// Guaranteed fraction of each link the class traverses, in (0, 1].
    pub share: f64,
    /// Lower rank is served first under congestion.
    pub priority: u32,
    /// Optional borrowing ceiling as a fraction of link capacity.
    #[serde(default)]
    pub ceil_share: Option<f64>,
    pub pattern: TrafficPattern,
    /// Defaults to the pattern's natural protocol.
    #[serde(default)]
    pub protocol: Option<Protocol>,
    #[serde(default)]
    pub flows: Vec<FlowSpec>,
}

impl ClassPolicy {
    pub fn protocol(&self) -> Protocol {
        self.protocol
            .unwrap_or_else(|| self.pattern.default_protocol())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.share.is_finite() && self.share > 0.0 && self.share <= 1.0) {
            return Err(ConfigError::InvalidShare {
                class: self.class,
                share: self.share,
            });
        }
        if let Some(ceil) = self.ceil_share {
            if !(ceil.is_finite() && ceil >= self.share && ceil <= 1.0) {
                return Err(ConfigError::InvalidCeiling {
                    class: self.class,
                    share: self.share,
                    ceil,
                });
            }
        }
        self.pattern
            .validate()
            .map_err(|reason| ConfigError::InvalidPattern {
                class: self.class,
                reason,
            })
    }
}

/// Class policies in declaration order. Declaration order breaks priority ties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySet {
    pub classes: Vec<ClassPolicy>,
    /// Accept links whose guarantees add up to more than their capacity.
    #[serde(default)]
    pub allow_oversubscription: bool,
}

impl PolicySet {
    pub fn new(classes: Vec<ClassPolicy>) -> Self {
        Self {
            classes,
            allow_oversubscription: false,
        }
    }

    pub fn class_order(&self) -> Vec<ServiceClass> {
        self.classes.iter().map(|c| c.class).collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = Vec::with_capacity(self.classes.len());
        for policy in &self.classes {
            if seen.contains(&policy.class) {
                return Err(ConfigError::DuplicateClass(policy.class));
            }
            seen.push(policy.class);
            policy.validate()?;
        }
        Ok(())
    }
}
