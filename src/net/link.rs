//! 链路类型
//!
//! 定义网络链路（全双工）及其传输时延计算。

use std::time::Duration;

use super::id::{HostId, LinkId, NodeId, SwitchId};

/// 网络链路
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: LinkId,
    pub name: String,
    pub a: NodeId,
    pub b: NodeId,
    pub bandwidth_bps: u64,
    /// 单向传播时延
    pub delay: Duration,
    /// 丢包概率，取值 [0, 1]
    pub loss: f64,
}

impl Link {
    /// 创建新链路
    pub fn new(
        id: LinkId,
        name: impl Into<String>,
        a: NodeId,
        b: NodeId,
        bandwidth_bps: u64,
        delay: Duration,
        loss: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            a,
            b,
            bandwidth_bps,
            delay,
            loss,
        }
    }

    /// 链路两端中的交换机（按标识符升序）
    pub fn switches(&self) -> Vec<SwitchId> {
        let mut out: Vec<SwitchId> = [self.a, self.b]
            .into_iter()
            .filter_map(NodeId::as_switch)
            .collect();
        out.sort();
        out
    }

    /// 接入链路的主机端；交换机之间的链路返回 None
    pub fn host(&self) -> Option<HostId> {
        self.a.as_host().or_else(|| self.b.as_host())
    }
}

/// ceil(bytes*8 / bps) 秒，换算为纳秒
pub fn serialization_time(bytes: u64, rate_bps: u64) -> Duration {
    if rate_bps == 0 {
        return Duration::from_nanos(u64::MAX / 4);
    }
    let bits = (bytes as u128).saturating_mul(8);
    let nanos = (bits.saturating_mul(1_000_000_000u128) + (rate_bps as u128 - 1)) / rate_bps as u128;
    Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
}
