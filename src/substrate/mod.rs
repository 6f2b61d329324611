//! 网络底座抽象
//!
//! 实验运行器只通过 [`Substrate`] 与网络交互：建链、装队列、装路由、发送流量、抓包、拆除。
//! 内置实现 [`EmulatedSubstrate`] 在进程内按链路带宽、时延、丢包与 HTB 式整形器模拟传输耗时。

mod capture;
mod emulated;

use std::net::Ipv4Addr;
use std::time::Duration;

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, SubstrateError};
use crate::net::{Host, Link, LinkId, Route};
use crate::qos::{QueueConfig, ServiceClass};
use crate::time::Timestamp;
use crate::traffic::Protocol;

pub use capture::{CaptureSample, CaptureSession, read_capture_file};
pub use emulated::{EmulatedSubstrate, HostFault, MIN_FLOW_RATE_BPS};

/// 一次单向传输请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub flow_id: u64,
    pub class: ServiceClass,
    pub protocol: Protocol,
    pub bytes: u64,
}

/// 传输结果：实际送达字节数与耗时
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub bytes: u64,
    pub elapsed: Duration,
}

/// 链路上观察到的一次传输（抓包元数据，不含负载）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketMeta {
    pub ts: Timestamp,
    pub link: LinkId,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: Protocol,
    pub bytes: u64,
    /// 发送方给流量打的类别标签；底座不知道时为 None
    #[serde(default)]
    pub class: Option<ServiceClass>,
}

/// 网络底座能力集合。所有方法都可以被多个流量任务并发调用。
pub trait Substrate: Send + Sync {
    fn create_link(&self, link: &Link) -> Result<(), SubstrateError>;

    fn install_queue(&self, link: LinkId, queue: &QueueConfig) -> Result<(), SubstrateError>;

    fn install_route(&self, route: &Route) -> Result<(), SubstrateError>;

    /// 阻塞直到传输完成。失败只影响这一次传输。
    fn send_traffic(&self, src: &Host, dst: &Host, transfer: &Transfer)
    -> Result<Delivery, FlowError>;

    /// 订阅链路抓包。拆除底座时所有订阅通道关闭。
    fn capture_packets(&self, link: LinkId) -> Result<Receiver<PacketMeta>, SubstrateError>;

    fn teardown(&self);
}
