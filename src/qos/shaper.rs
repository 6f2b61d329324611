//! Class-based link shaper (HTB-like).
//!
//! Every active class first receives its guaranteed min-rate. Spare capacity is
//! then lent in strict priority order, each class capped at its ceiling.
//! Classes without an installed queue fall into the default class: no
//! guarantee, and the spare capacity is split evenly between each of them and
//! the configured classes taken as one group; whatever the configured classes
//! cannot borrow goes to the default class too. With no queues installed at
//! all, active classes split the link evenly.

use std::collections::BTreeMap;

use super::{QueueConfig, ServiceClass};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkShaper {
    capacity_bps: u64,
    queues: Vec<QueueConfig>,
}

impl LinkShaper {
    pub fn new(capacity_bps: u64) -> Self {
        Self {
            capacity_bps,
            queues: Vec::new(),
        }
    }

    /// Install a queue, keeping priority order (ties in installation order).
    pub fn install(&mut self, queue: QueueConfig) {
        self.queues.retain(|q| q.class != queue.class);
        let pos = self
            .queues
            .iter()
            .position(|q| q.priority > queue.priority)
            .unwrap_or(self.queues.len());
        self.queues.insert(pos, queue);
    }

    pub fn clear(&mut self) {
        self.queues.clear();
    }

    pub fn queues(&self) -> &[QueueConfig] {
        &self.queues
    }

    pub fn is_shaping(&self) -> bool {
        !self.queues.is_empty()
    }

    /// Rate granted to each class in `active`. The sum never exceeds capacity.
    pub fn rates(&self, active: &[ServiceClass]) -> BTreeMap<ServiceClass, u64> {
        let mut active: Vec<ServiceClass> = active.to_vec();
        active.sort();
        active.dedup();

        let mut out = BTreeMap::new();
        if active.is_empty() {
            return out;
        }

        if !self.is_shaping() {
            let each = self.capacity_bps / active.len() as u64;
            for class in active {
                out.insert(class, each);
            }
            return out;
        }

        let configured: Vec<&QueueConfig> = self
            .queues
            .iter()
            .filter(|q| active.contains(&q.class))
            .collect();

        let unconfigured: Vec<ServiceClass> = active
            .iter()
            .copied()
            .filter(|c| !configured.iter().any(|q| q.class == *c))
            .collect();

        let mut spare = self.capacity_bps;
        for q in &configured {
            let guaranteed = q.min_rate_bps.min(spare);
            spare -= guaranteed;
            out.insert(q.class, guaranteed);
        }

        // 默认类先拿走自己的那几份，已配置类别只在剩下的一份里按优先级借用
        let n = unconfigured.len() as u64;
        let reserved_default = spare / (n + 1) * n;
        let mut lendable = spare - reserved_default;
        for q in &configured {
            if lendable == 0 {
                break;
            }
            let granted = out.entry(q.class).or_insert(0);
            let room = q.ceiling(self.capacity_bps).saturating_sub(*granted);
            let lend = room.min(lendable);
            *granted += lend;
            lendable -= lend;
        }

        if n > 0 {
            let each = (reserved_default + lendable) / n;
            for class in unconfigured {
                out.insert(class, each);
            }
        }
        out
    }
}
