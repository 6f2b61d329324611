//! 抓包会话
//!
//! 每条链路一个写线程：从底座的抓包通道读取 [`PacketMeta`]，补全链路名、相邻交换机、
//! 推断类别与 last-hop 标记后写入 `captures/<link>.jsonl`。底座拆除时通道关闭，
//! 写线程排空后退出；[`CaptureSession::finish`] 汇合所有写线程并返回全部样本。

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{PacketMeta, Substrate};
use crate::error::Error;
use crate::net::{AddressPlan, Topology};
use crate::qos::ServiceClass;
use crate::time::Timestamp;
use crate::traffic::Protocol;

/// 分析器消费的抓包样本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSample {
    pub ts: Timestamp,
    pub link: String,
    /// 链路相邻的交换机（交换机间链路为两个）
    pub switches: Vec<String>,
    pub bytes: u64,
    /// 优先取流量自带的类别标签，否则按源地址、再按目的地址匹配子网推断
    pub class: Option<ServiceClass>,
    pub protocol: Protocol,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    /// 该链路把流量交付给目的主机
    pub last_hop: bool,
}

/// 写线程需要的链路上下文（全部自有，线程不借用拓扑）
struct LinkContext {
    name: String,
    switches: Vec<String>,
    /// 接入链路另一端主机的地址
    host_addr: Option<Ipv4Addr>,
    plan: AddressPlan,
}

impl LinkContext {
    fn sample(&self, meta: PacketMeta) -> CaptureSample {
        // 跨类别的流（如 web h1 -> h3 的响应）按标签归属，不按发送方子网
        let class = meta
            .class
            .or_else(|| self.plan.classify(meta.src))
            .or_else(|| self.plan.classify(meta.dst));
        CaptureSample {
            ts: meta.ts,
            link: self.name.clone(),
            switches: self.switches.clone(),
            bytes: meta.bytes,
            class,
            protocol: meta.protocol,
            src: meta.src,
            dst: meta.dst,
            last_hop: self.host_addr == Some(meta.dst),
        }
    }
}

type Writer = JoinHandle<Result<Vec<CaptureSample>, Error>>;

pub struct CaptureSession {
    writers: Vec<(String, Writer)>,
}

impl CaptureSession {
    /// 订阅拓扑中每条链路。`dir` 为 None 时只在内存中收集。
    #[tracing::instrument(skip_all, fields(links = topo.links().len()))]
    pub fn start(
        substrate: &dyn Substrate,
        topo: &Topology,
        dir: Option<&Path>,
    ) -> Result<Self, Error> {
        if let Some(dir) = dir {
            fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        let mut writers = Vec::with_capacity(topo.links().len());
        for link in topo.links() {
            let rx = substrate.capture_packets(link.id)?;
            let ctx = LinkContext {
                name: link.name.clone(),
                switches: link
                    .switches()
                    .into_iter()
                    .map(|s| topo.switch(s).name.clone())
                    .collect(),
                host_addr: link.host().map(|h| topo.host(h).addr),
                plan: topo.address_plan().clone(),
            };
            let path = dir.map(|d| d.join(format!("{}.jsonl", link.name)));
            let name = format!("capture-{}", link.name);
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || drain(ctx, rx, path))
                .map_err(|source| Error::Spawn {
                    name: name.clone(),
                    source,
                })?;
            writers.push((name, handle));
        }
        debug!(writers = writers.len(), "capture started");
        Ok(Self { writers })
    }

    /// 汇合所有写线程。必须在底座拆除（通道关闭）之后调用，否则会一直阻塞。
    pub fn finish(self) -> Result<Vec<CaptureSample>, Error> {
        let mut samples = Vec::new();
        let mut first_err = None;
        // 先汇合全部写线程，再报告第一个错误
        for (name, handle) in self.writers {
            match handle.join().map_err(|_| Error::TaskPanicked(name.clone())).and_then(|r| r) {
                Ok(got) => samples.extend(got),
                Err(err) => {
                    warn!(writer = %name, error = %err, "capture writer failed");
                    first_err.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_err {
            return Err(err);
        }
        samples.sort_by(|a, b| (a.ts, &a.link).cmp(&(b.ts, &b.link)));
        info!(samples = samples.len(), "✅ capture drained");
        Ok(samples)
    }
}

fn drain(
    ctx: LinkContext,
    rx: Receiver<PacketMeta>,
    path: Option<PathBuf>,
) -> Result<Vec<CaptureSample>, Error> {
    let mut out = match &path {
        Some(p) => Some(BufWriter::new(File::create(p).map_err(|e| Error::io(p, e))?)),
        None => None,
    };
    let mut samples = Vec::new();
    for meta in rx.iter() {
        let sample = ctx.sample(meta);
        if let (Some(w), Some(p)) = (out.as_mut(), path.as_ref()) {
            serde_json::to_writer(&mut *w, &sample)?;
            w.write_all(b"\n").map_err(|e| Error::io(p, e))?;
        }
        samples.push(sample);
    }
    if let (Some(mut w), Some(p)) = (out, path.as_ref()) {
        w.flush().map_err(|e| Error::io(p, e))?;
    }
    Ok(samples)
}

/// 读取一个 `captures/<link>.jsonl` 文件
pub fn read_capture_file(path: &Path) -> Result<Vec<CaptureSample>, Error> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(Error::from))
        .collect()
}
