use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FlowError;
use crate::qos::ServiceClass;
use crate::time::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    Other,
}

/// One generated transfer (or request/response exchange).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub flow_id: u64,
    pub class: ServiceClass,
    pub src: String,
    pub dst: String,
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
    pub protocol: Protocol,
    pub start: Timestamp,
    pub end: Timestamp,
    pub requested_bytes: u64,
    /// Bytes delivered; zero when the transfer failed.
    pub bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FlowError>,
}

impl FlowRecord {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn duration(&self) -> Duration {
        self.end.since(self.start)
    }
}
