//! Concurrent traffic generation.
//!
//! One named thread per planned flow. Each thread loops until the shared
//! deadline: draw an exchange from the class pattern, push it through the
//! substrate, emit a [`FlowRecord`], then wait out the pattern's pacing.
//! Records are collected over a channel; a failing transfer yields a zero-byte
//! record carrying its error and never stops the other tasks.

use std::thread;
use std::time::Duration;

use crossbeam_channel::{Sender, unbounded};
use tracing::{debug, info, trace, warn};

use super::{FlowRecord, Pacing, PlannedFlow, TrafficPlan};
use crate::error::{Error, FlowError};
use crate::net::{Host, Topology};
use crate::substrate::{Delivery, Substrate, Transfer};
use crate::time::{Clock, Deadline, Timestamp};

const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

pub struct TrafficGenerator<'a> {
    substrate: &'a dyn Substrate,
    clock: &'a dyn Clock,
}

impl<'a> TrafficGenerator<'a> {
    pub fn new(substrate: &'a dyn Substrate, clock: &'a dyn Clock) -> Self {
        Self { substrate, clock }
    }

    /// Run every planned flow until `duration` elapses and return the records
    /// sorted by start time.
    #[tracing::instrument(skip_all, fields(flows = plan.flows().len(), duration_ms = duration.as_millis() as u64))]
    pub fn generate(
        &self,
        topo: &Topology,
        plan: &TrafficPlan,
        duration: Duration,
    ) -> Result<Vec<FlowRecord>, Error> {
        let deadline = Deadline::after(self.clock, duration);
        let (tx, rx) = unbounded();

        thread::scope(|scope| -> Result<(), Error> {
            let mut handles = Vec::with_capacity(plan.flows().len());
            for (task, flow) in plan.flows().iter().enumerate() {
                let kind = if flow.reserved { "traffic" } else { "cross" };
                let name = format!("{kind}-{}-{task}", flow.class);
                let worker = Worker {
                    task: task as u64,
                    flow,
                    src: topo.host(flow.src),
                    dst: topo.host(flow.dst),
                    substrate: self.substrate,
                    clock: self.clock,
                    deadline,
                    rng: fastrand::Rng::with_seed(plan.seed() ^ (task as u64).wrapping_mul(SEED_STRIDE)),
                    tx: tx.clone(),
                };
                let handle = thread::Builder::new()
                    .name(name.clone())
                    .spawn_scoped(scope, move || worker.run())
                    .map_err(|source| Error::Spawn {
                        name: name.clone(),
                        source,
                    })?;
                handles.push((name, handle));
            }
            drop(tx);

            for (name, handle) in handles {
                if handle.join().is_err() {
                    return Err(Error::TaskPanicked(name));
                }
            }
            Ok(())
        })?;

        let mut records: Vec<FlowRecord> = rx.try_iter().collect();
        records.sort_by_key(|r| (r.start, r.flow_id));
        let failed = records.iter().filter(|r| r.is_failed()).count();
        info!(records = records.len(), failed, "✅ traffic generation finished");
        Ok(records)
    }
}

struct Worker<'a> {
    task: u64,
    flow: &'a PlannedFlow,
    src: &'a Host,
    dst: &'a Host,
    substrate: &'a dyn Substrate,
    clock: &'a dyn Clock,
    deadline: Deadline,
    rng: fastrand::Rng,
    tx: Sender<FlowRecord>,
}

impl Worker<'_> {
    fn run(mut self) {
        debug!(
            task = self.task,
            class = %self.flow.class,
            src = %self.src.name,
            dst = %self.dst.name,
            "▶️ traffic task started"
        );
        let mut seq: u64 = 0;
        loop {
            let start = self.clock.now();
            if start >= self.deadline.at() {
                break;
            }
            let exchange = self.flow.pattern.next_exchange(&mut self.rng);
            let flow_id = (self.task << 32) | seq;
            seq += 1;

            let outcome = self.exchange(flow_id, exchange.request_bytes, exchange.response_bytes);
            let end = self.clock.now();
            let requested = exchange.request_bytes + exchange.response_bytes.unwrap_or(0);
            let record = self.record(flow_id, start, end, requested, outcome);
            if let Some(err) = &record.error {
                warn!(flow_id, class = %self.flow.class, error = %err, "transfer failed");
            } else {
                trace!(flow_id, bytes = record.bytes, "transfer done");
            }
            if self.tx.send(record).is_err() {
                break;
            }

            let wake = match exchange.pacing {
                Pacing::AfterCompletion(think) => end.saturating_add(think),
                Pacing::FixedInterval(period) => start.saturating_add(period),
            };
            self.sleep_until(wake);
        }
        debug!(task = self.task, exchanges = seq, "traffic task finished");
    }

    fn exchange(
        &self,
        flow_id: u64,
        request_bytes: u64,
        response_bytes: Option<u64>,
    ) -> Result<u64, FlowError> {
        let request = Transfer {
            flow_id,
            class: self.flow.class,
            protocol: self.flow.protocol,
            bytes: request_bytes,
        };
        let Delivery { bytes: mut total, .. } =
            self.substrate.send_traffic(self.src, self.dst, &request)?;
        if let Some(bytes) = response_bytes {
            let response = Transfer { bytes, ..request };
            total += self.substrate.send_traffic(self.dst, self.src, &response)?.bytes;
        }
        Ok(total)
    }

    fn record(
        &self,
        flow_id: u64,
        start: Timestamp,
        end: Timestamp,
        requested_bytes: u64,
        outcome: Result<u64, FlowError>,
    ) -> FlowRecord {
        let (bytes, error) = match outcome {
            Ok(bytes) => (bytes, None),
            Err(err) => (0, Some(err)),
        };
        FlowRecord {
            flow_id,
            class: self.flow.class,
            src: self.src.name.clone(),
            dst: self.dst.name.clone(),
            src_addr: self.src.addr,
            dst_addr: self.dst.addr,
            protocol: self.flow.protocol,
            start,
            end,
            requested_bytes,
            bytes,
            error,
        }
    }

    /// Sleep until `wake`, never past the deadline.
    fn sleep_until(&self, wake: Timestamp) {
        let target = wake.min(self.deadline.at());
        let now = self.clock.now();
        if target > now {
            self.clock.sleep(target.since(now));
        }
    }
}
