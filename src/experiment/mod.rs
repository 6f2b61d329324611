//! 实验运行器
//!
//! 显式的生命周期：build → install → generate → capture → analyze → teardown。
//! `build` 完成全部配置期校验（拓扑、路由、策略），失败时不会创建任何目录或文件。

pub mod artifacts;
mod suite;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::analysis::{AnalysisReport, Analyzer, AnalyzerConfig};
use crate::config::{ExperimentConfig, RoutingMode};
use crate::error::{ConfigError, Error};
use crate::net::{RouteTable, StaticRouter, Topology};
use crate::qos::{CompiledPolicy, PolicyEngine, ServiceClass};
use crate::substrate::{CaptureSample, CaptureSession, EmulatedSubstrate, Substrate};
use crate::time::{Clock, WallClock};
use crate::traffic::{FlowRecord, TrafficGenerator, TrafficPlan};

use artifacts::{PolicyArtifact, RunLayout};

pub use suite::{SUITE, SuiteEntry, SuiteSummary, SUMMARY_FILE, run_suite};

/// 一次实验的全部配置期产物。构建后不可变。
#[derive(Debug, Clone)]
pub struct Experiment {
    config: ExperimentConfig,
    topology: Topology,
    routes: RouteTable,
    policy: CompiledPolicy,
    plan: TrafficPlan,
    analyzer: Analyzer,
}

impl Experiment {
    #[tracing::instrument(skip_all, fields(name = %config.experiment_name()))]
    pub fn build(config: ExperimentConfig) -> Result<Self, Error> {
        config.validate()?;
        let analyzer = Analyzer::new(config.analyzer_config()?);
        let policies = config.policy_set();

        let topology = Topology::build(&config.topology, &config.class_order())?;
        let routes = StaticRouter::compute_routes(&topology)?;
        let plan = TrafficPlan::resolve(&policies, &topology, config.seed)?
            .with_cross_traffic(&config.cross_traffic, &topology)?;
        for fault in &config.faults {
            if topology.host_by_name(&fault.host).is_none() {
                return Err(ConfigError::UnknownHost(fault.host.clone()).into());
            }
        }
        let policy = PolicyEngine::new(&topology, &routes).compile(&policies, &plan)?;

        info!(
            hosts = topology.hosts().len(),
            routes = routes.len(),
            flows = plan.flows().len(),
            cross = plan.cross_traffic().count(),
            "✅ experiment built"
        );
        Ok(Self {
            config,
            topology,
            routes,
            policy,
            plan,
            analyzer,
        })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn policy(&self) -> &CompiledPolicy {
        &self.policy
    }

    pub fn plan(&self) -> &TrafficPlan {
        &self.plan
    }

    /// 每个类别的端到端保证带宽（与是否安装队列无关）
    pub fn guarantees(&self) -> BTreeMap<ServiceClass, u64> {
        self.policy.class_guarantees()
    }

    pub fn policy_artifact(&self) -> PolicyArtifact {
        PolicyArtifact {
            qos_enabled: self.config.options.qos,
            routing: self.config.options.routing,
            queues: self.policy.all_queues(),
            guarantees: self.guarantees(),
        }
    }

    /// 建链；按选项安装队列与静态路由。流量开始后不再改动。
    #[tracing::instrument(skip_all)]
    pub fn install(&self, substrate: &dyn Substrate) -> Result<(), Error> {
        for link in self.topology.links() {
            substrate.create_link(link)?;
        }
        let mut queues = 0;
        if self.config.options.qos {
            for (link, configs) in self.policy.iter() {
                for q in configs {
                    substrate.install_queue(link, q)?;
                    queues += 1;
                }
            }
        }
        let mut routes = 0;
        if self.config.options.routing == RoutingMode::Static {
            for route in self.routes.routes() {
                substrate.install_route(route)?;
                routes += 1;
            }
        }
        info!(links = self.topology.links().len(), queues, routes, "✅ substrate configured");
        Ok(())
    }

    pub fn generate(
        &self,
        substrate: &dyn Substrate,
        clock: &dyn Clock,
    ) -> Result<Vec<FlowRecord>, Error> {
        TrafficGenerator::new(substrate, clock).generate(
            &self.topology,
            &self.plan,
            self.config.duration(),
        )
    }

    pub fn teardown(&self, substrate: &dyn Substrate) {
        substrate.teardown();
    }

    pub fn analyze(&self, flows: &[FlowRecord], samples: &[CaptureSample]) -> AnalysisReport {
        self.analyzer.analyze(flows, samples, &self.guarantees())
    }

    /// 完整运行一次。`layout` 为 None 时只在内存中进行，不写任何文件。
    #[tracing::instrument(skip_all, fields(name = %self.config.experiment_name()))]
    pub fn run(
        &self,
        substrate: &dyn Substrate,
        clock: &dyn Clock,
        layout: Option<&RunLayout>,
    ) -> Result<AnalysisReport, Error> {
        if let Some(layout) = layout {
            layout.create()?;
        }
        if let Err(err) = self.install(substrate) {
            substrate.teardown();
            return Err(err);
        }

        let capture_dir = layout.map(RunLayout::capture_dir);
        let capture = match CaptureSession::start(substrate, &self.topology, capture_dir.as_deref()) {
            Ok(c) => c,
            Err(err) => {
                substrate.teardown();
                return Err(err);
            }
        };

        info!(duration_secs = self.config.duration().as_secs_f64(), "▶️ generating traffic");
        let generated = self.generate(substrate, clock);
        self.teardown(substrate);
        let samples = capture.finish()?;
        let flows = generated?;

        if let Some(layout) = layout {
            artifacts::append_flow_log(&layout.flow_log(), &flows)?;
            artifacts::write_policy(&layout.policy_file(), &self.policy_artifact())?;
        }

        let report = self.analyze(&flows, &samples);
        for (class, c) in &report.classes {
            if c.failed_flows > 0 {
                warn!(%class, failed = c.failed_flows, "class had failed flows");
            }
        }
        if let Some(layout) = layout {
            artifacts::write_report(&layout.report_file(), &report)?;
        }
        Ok(report)
    }
}

/// 在内置仿真底座上运行实验，产物写入 `out_dir`。
pub fn run(config: ExperimentConfig, out_dir: &Path) -> Result<AnalysisReport, Error> {
    let experiment = Experiment::build(config)?;
    let clock: Arc<dyn Clock> = Arc::new(WallClock::start());
    let substrate =
        EmulatedSubstrate::new(Arc::clone(&clock)).with_faults(experiment.config().faults.clone());
    let layout = RunLayout::new(out_dir);
    experiment.run(&substrate, clock.as_ref(), Some(&layout))
}

/// 用新的容差重新分析已有运行目录。
pub fn reanalyze(run_dir: &Path, tolerance: f64) -> Result<AnalysisReport, Error> {
    let layout = RunLayout::new(run_dir);
    let analyzer = Analyzer::new(AnalyzerConfig::new(tolerance)?);
    let flows = artifacts::read_flow_log(&layout.flow_log())?;
    let samples = artifacts::read_captures(&layout.capture_dir())?;
    let policy = artifacts::read_policy(&layout.policy_file())?;
    Ok(analyzer.analyze(&flows, &samples, &policy.guarantees))
}
