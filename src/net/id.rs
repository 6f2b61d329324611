//! 标识符类型
//!
//! 定义主机、交换机和链路的唯一标识符。标识符按声明顺序分配，
//! 路由的确定性平局规则依赖交换机标识符的大小顺序。

use serde::{Deserialize, Serialize};

/// 主机标识符
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct HostId(pub usize);

/// 交换机标识符
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SwitchId(pub usize);

/// 链路标识符
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LinkId(pub usize);

/// 链路端点：主机或交换机
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeId {
    Host(HostId),
    Switch(SwitchId),
}

impl NodeId {
    pub fn as_switch(self) -> Option<SwitchId> {
        match self {
            NodeId::Switch(s) => Some(s),
            NodeId::Host(_) => None,
        }
    }

    pub fn as_host(self) -> Option<HostId> {
        match self {
            NodeId::Host(h) => Some(h),
            NodeId::Switch(_) => None,
        }
    }
}
