//! 流量生成模块
//!
//! 类别流量模式（突发请求/响应、恒定码率流、周期性小包）、跨类别压力流量、解析后的流量计划、
//! 逐次传输的流记录，以及按截止时间并发运行所有流的生成器。

mod generator;
mod pattern;
mod plan;
mod record;

pub use generator::TrafficGenerator;
pub use pattern::{Exchange, Pacing, SizeRange, TrafficPattern};
pub use plan::{CrossTrafficSpec, FlowSpec, PlannedFlow, TrafficPlan};
pub use record::{FlowRecord, Protocol};
