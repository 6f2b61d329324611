//! 静态路由
//!
//! 在交换机图上按最短跳数（BFS）为每一对子网预计算唯一路由。
//! 邻居按交换机标识符升序展开，因此跳数相同的多条路径中总是选择标识符最小的那条，
//! 多次运行结果完全一致。路由表一旦计算完成即不可变。

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::addressing::Subnet;
use super::id::{LinkId, SwitchId};
use super::node::Host;
use super::topology::Topology;
use crate::error::{SubnetPair, UnreachableError};
use crate::qos::ServiceClass;

/// 两个子网之间的交换机跳序列（含首尾网关）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub src: Subnet,
    pub dst: Subnet,
    pub hops: Vec<SwitchId>,
}

impl Route {
    /// 路由经过的交换机间链路（按顺序）
    pub fn links(&self, topo: &Topology) -> Vec<LinkId> {
        self.hops
            .windows(2)
            .filter_map(|w| topo.switch_link(w[0], w[1]))
            .collect()
    }

    pub fn hop_count(&self) -> usize {
        self.hops.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    /// (源类别子网, 目的类别子网) -> 路由
    routes: BTreeMap<(ServiceClass, ServiceClass), Route>,
}

impl RouteTable {
    pub fn get(&self, src: ServiceClass, dst: ServiceClass) -> Option<&Route> {
        self.routes.get(&(src, dst))
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// 主机到主机的完整链路序列：源接入链路、路由上的交换机间链路、目的接入链路。
    pub fn path_links(&self, topo: &Topology, src: &Host, dst: &Host) -> Option<Vec<LinkId>> {
        let route = self.get(src.class, dst.class)?;
        let mut links = Vec::with_capacity(route.hops.len() + 1);
        links.push(src.link);
        links.extend(route.links(topo));
        links.push(dst.link);
        Some(links)
    }
}

/// 无状态的静态路由计算器
pub struct StaticRouter;

impl StaticRouter {
    /// 为每一个有序子网对计算路由（包括子网到自身）。
    /// 任意一对不连通时返回 [`UnreachableError`]，列出全部不可达的子网对。
    #[tracing::instrument(skip_all)]
    pub fn compute_routes(topo: &Topology) -> Result<RouteTable, UnreachableError> {
        let subnets = topo.address_plan().subnets();
        let mut routes = BTreeMap::new();
        let mut unreachable = Vec::new();

        for src in subnets {
            let Some(from) = topo.gateway(src.class) else {
                continue;
            };
            let parent = bfs_parents(topo, from);
            for dst in subnets {
                let Some(to) = topo.gateway(dst.class) else {
                    continue;
                };
                match unwind(&parent, from, to) {
                    Some(hops) => {
                        debug!(src = %src, dst = %dst, hops = ?hops, "计算路由");
                        routes.insert(
                            (src.class, dst.class),
                            Route {
                                src: *src,
                                dst: *dst,
                                hops,
                            },
                        );
                    }
                    None => {
                        warn!(src = %src, dst = %dst, "子网不可达");
                        unreachable.push(SubnetPair {
                            src: *src,
                            dst: *dst,
                        });
                    }
                }
            }
        }

        if !unreachable.is_empty() {
            return Err(UnreachableError { pairs: unreachable });
        }
        info!(routes = routes.len(), "✅ 静态路由计算完成");
        Ok(RouteTable { routes })
    }
}

/// 从 `from` 出发做 BFS；邻居按标识符升序展开，先发现者成为父节点。
fn bfs_parents(topo: &Topology, from: SwitchId) -> Vec<Option<SwitchId>> {
    let n = topo.switches().len();
    let mut parent: Vec<Option<SwitchId>> = vec![None; n];
    let mut seen = vec![false; n];
    let mut q: VecDeque<SwitchId> = VecDeque::new();

    seen[from.0] = true;
    q.push_back(from);
    while let Some(v) = q.pop_front() {
        for (next, _) in topo.switch(v).neighbor_switches() {
            if !seen[next.0] {
                seen[next.0] = true;
                parent[next.0] = Some(v);
                q.push_back(next);
            }
        }
    }
    parent
}

fn unwind(parent: &[Option<SwitchId>], from: SwitchId, to: SwitchId) -> Option<Vec<SwitchId>> {
    let mut hops = vec![to];
    let mut cur = to;
    while cur != from {
        cur = parent[cur.0]?;
        hops.push(cur);
    }
    hops.reverse();
    Some(hops)
}
