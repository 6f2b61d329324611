//! 网络模型模块
//!
//! 此模块包含拓扑模型（主机、交换机、链路）、按类别划分的地址规划以及静态路由。

// 子模块声明
mod addressing;
mod id;
mod link;
mod node;
mod routing;
mod topology;

// 重新导出公共接口
pub use addressing::{AddressPlan, MAX_HOSTS_PER_SUBNET, SUBNET_PREFIX_LEN, Subnet};
pub use id::{HostId, LinkId, NodeId, SwitchId};
pub use link::{Link, serialization_time};
pub use node::{Adjacency, Host, Switch};
pub use routing::{Route, RouteTable, StaticRouter};
pub use topology::Topology;
