//! 流量分析模块
//!
//! 把流记录与抓包样本按时间窗口和类别关联，计算各类别实际吞吐并给出合规判定，
//! 同时汇总交换机/链路流量、主机收发量与协议分布。

mod analyzer;
mod report;

pub use analyzer::{Analyzer, AnalyzerConfig, DEFAULT_TOLERANCE};
pub use report::{
    AnalysisReport, ClassReport, FlowPairReport, HostTraffic, ProtocolShare, Verdict,
};
