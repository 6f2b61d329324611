//! 节点类型
//!
//! 定义主机和交换机。实验开始后二者都不可变。

use std::net::Ipv4Addr;

use super::id::{HostId, LinkId, NodeId, SwitchId};
use crate::qos::ServiceClass;

/// 主机节点
#[derive(Debug, Clone, PartialEq)]
pub struct Host {
    pub id: HostId,
    pub name: String,
    pub class: ServiceClass,
    pub addr: Ipv4Addr,
    /// 所在子网的网关交换机
    pub switch: SwitchId,
    /// 接入链路
    pub link: LinkId,
    /// 接口速率（接入链路带宽）
    pub rate_bps: u64,
}

/// 邻接关系：邻居节点及连接它的链路
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Adjacency {
    pub neighbor: NodeId,
    pub link: LinkId,
}

/// 交换机节点
#[derive(Debug, Clone, PartialEq)]
pub struct Switch {
    pub id: SwitchId,
    pub name: String,
    adjacency: Vec<Adjacency>,
}

impl Switch {
    /// 创建新交换机
    pub fn new(id: SwitchId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            adjacency: Vec::new(),
        }
    }

    pub(crate) fn attach(&mut self, neighbor: NodeId, link: LinkId) {
        self.adjacency.push(Adjacency { neighbor, link });
        self.adjacency.sort();
    }

    /// 相邻交换机，按标识符升序
    pub fn neighbor_switches(&self) -> impl Iterator<Item = (SwitchId, LinkId)> + '_ {
        self.adjacency
            .iter()
            .filter_map(|adj| adj.neighbor.as_switch().map(|s| (s, adj.link)))
    }
}
