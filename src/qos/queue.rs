//! 队列配置
//!
//! 每条链路、每个类别一条配置，对应 HTB 的一个子类（`1:10`, `1:20`, ...）。

use serde::{Deserialize, Serialize};

use super::ServiceClass;
use crate::net::LinkId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub link: LinkId,
    pub class: ServiceClass,
    /// HTB minor id, `10 × (declaration index + 1)`.
    pub queue_id: u16,
    pub min_rate_bps: u64,
    /// Borrowing ceiling; `None` means the full link capacity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rate_bps: Option<u64>,
    pub priority: u32,
}

impl QueueConfig {
    pub fn ceiling(&self, capacity_bps: u64) -> u64 {
        self.max_rate_bps
            .unwrap_or(capacity_bps)
            .min(capacity_bps)
            .max(self.min_rate_bps.min(capacity_bps))
    }

    /// `tc` style class handle.
    pub fn handle(&self) -> String {
        format!("1:{}", self.queue_id)
    }
}
