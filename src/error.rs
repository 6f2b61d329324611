//! Error taxonomy.
//!
//! Configuration-time errors ([`ConfigError`], [`OversubscriptionError`],
//! [`UnreachableError`]) halt a run before anything is installed. [`FlowError`]
//! is recorded on the failing [`FlowRecord`](crate::traffic::FlowRecord) and the
//! run carries on.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::{LinkId, Subnet};
use crate::qos::ServiceClass;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed experiment description: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported schema_version {found}, expected {expected}")]
    UnsupportedSchema { found: u32, expected: u32 },
    #[error("duration must be a finite number of seconds > 0, got {0}")]
    InvalidDuration(f64),
    #[error("tolerance must be a finite value > 0, got {0}")]
    InvalidTolerance(f64),
    #[error("topology declares no switches")]
    NoSwitches,
    #[error("switch {0} declared twice")]
    DuplicateSwitch(String),
    #[error("unknown switch {0}")]
    UnknownSwitch(String),
    #[error("unknown host {0}")]
    UnknownHost(String),
    #[error("link {link}: bandwidth must be > 0, got {bandwidth_mbps} Mbit/s")]
    NonPositiveBandwidth { link: String, bandwidth_mbps: f64 },
    #[error("link {link}: loss must be in [0, 1], got {loss}")]
    LossOutOfRange { link: String, loss: f64 },
    #[error("link {link}: delay must be a finite value >= 0 ms, got {delay_ms}")]
    InvalidDelay { link: String, delay_ms: f64 },
    #[error("link {0} connects a switch to itself")]
    SelfLoop(String),
    #[error("link {0} declared twice")]
    DuplicateLink(String),
    #[error("class {0} has zero hosts")]
    ZeroHosts(ServiceClass),
    #[error("class {0} declared more than once")]
    DuplicateClass(ServiceClass),
    #[error("host group for class {0} has no matching class policy")]
    UnpolicedClass(ServiceClass),
    #[error("class {class} hosts attach to several switches ({switches:?}); a subnet has one gateway switch")]
    SplitSubnet {
        class: ServiceClass,
        switches: Vec<String>,
    },
    #[error("class {class} has {count} hosts, its subnet holds at most {max}")]
    PoolExhausted {
        class: ServiceClass,
        count: usize,
        max: usize,
    },
    #[error("class {class}: guaranteed share must be in (0, 1], got {share}")]
    InvalidShare { class: ServiceClass, share: f64 },
    #[error("class {class}: ceiling share must be in [{share}, 1], got {ceil}")]
    InvalidCeiling {
        class: ServiceClass,
        share: f64,
        ceil: f64,
    },
    #[error("class {class}: invalid traffic pattern: {reason}")]
    InvalidPattern { class: ServiceClass, reason: String },
    #[error("class {class}: flow {src} -> {dst} starts on a {src_class} host")]
    FlowClassMismatch {
        class: ServiceClass,
        src: String,
        dst: String,
        src_class: ServiceClass,
    },
    #[error("class {class}: flow source and destination are both {host}")]
    LoopbackFlow { class: ServiceClass, host: String },
    #[error("cross traffic {src} -> {dst}: rate range must be 1 <= min <= max Mbit/s, got {min}..={max}")]
    InvalidCrossRate {
        src: String,
        dst: String,
        min: u64,
        max: u64,
    },
}

/// Sum of guaranteed rates on one link exceeds its capacity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "link {link} oversubscribed: classes [{}] request {requested_bps} bit/s, capacity is {capacity_bps} bit/s",
    join(.classes)
)]
pub struct OversubscriptionError {
    pub link: String,
    pub link_id: LinkId,
    pub capacity_bps: u64,
    pub requested_bps: u64,
    pub classes: Vec<ServiceClass>,
}

/// Pair of subnets with no path across the switch graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubnetPair {
    pub src: Subnet,
    pub dst: Subnet,
}

impl fmt::Display for SubnetPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unreachable subnet pairs: {}", join(.pairs))]
pub struct UnreachableError {
    pub pairs: Vec<SubnetPair>,
}

/// A single transfer failed. Stored on the flow record, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowError {
    #[error("host {host} unreachable")]
    HostUnreachable { host: String },
    #[error("no forwarding path from {src} to {dst}")]
    NoPath { src: String, dst: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstrateError {
    #[error("link {0:?} was never created")]
    UnknownLink(LinkId),
    #[error("link {0:?} created twice")]
    LinkExists(LinkId),
    #[error("route {src} -> {dst} is not installable: {reason}")]
    InvalidRoute {
        src: Subnet,
        dst: Subnet,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Oversubscription(#[from] OversubscriptionError),
    #[error(transparent)]
    Unreachable(#[from] UnreachableError),
    #[error("substrate rejected configuration: {0}")]
    Substrate(#[from] SubstrateError),
    #[error("i/o error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode artifact: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to spawn thread {name}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("traffic task {0} panicked")]
    TaskPanicked(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit status for the command surface.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Config(_) => 2,
            Error::Oversubscription(_) => 3,
            Error::Unreachable(_) => 4,
            _ => 1,
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
