//! 实验时间类型
//!
//! 时间戳以实验开始时刻为零点（纳秒）。生成器、仿真底座与抓包都通过 [`Clock`] 读取时间，
//! 因此同一次实验中的所有记录共享同一个时间轴。

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 实验时间（纳秒，自实验开始）。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_micros(us: u64) -> Timestamp {
        Timestamp(us.saturating_mul(1_000))
    }

    pub fn from_millis(ms: u64) -> Timestamp {
        Timestamp(ms.saturating_mul(1_000_000))
    }

    pub fn from_secs(s: u64) -> Timestamp {
        Timestamp(s.saturating_mul(1_000_000_000))
    }

    pub fn from_duration(d: Duration) -> Timestamp {
        Timestamp(d.as_nanos().min(u64::MAX as u128) as u64)
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1e9
    }

    /// Elapsed time since `earlier`, zero if `earlier` is later.
    pub fn since(self, earlier: Timestamp) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }

    pub fn saturating_add(self, d: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(Timestamp::from_duration(d).0))
    }
}

/// Source of experiment time shared by every phase of a run.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
    fn sleep(&self, d: Duration);
}

/// Wall clock anchored at the start of the experiment.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    epoch: Instant,
}

impl WallClock {
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Clock for WallClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_duration(self.epoch.elapsed())
    }

    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// Wall clock running `factor` times faster than real time. Sleeps shrink by
/// the same factor, so concurrent tasks keep their relative pacing.
#[derive(Debug, Clone, Copy)]
pub struct ScaledClock {
    epoch: Instant,
    factor: u32,
}

impl ScaledClock {
    pub fn start(factor: u32) -> Self {
        Self {
            epoch: Instant::now(),
            factor: factor.max(1),
        }
    }
}

impl Clock for ScaledClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_duration(self.epoch.elapsed() * self.factor)
    }

    fn sleep(&self, d: Duration) {
        std::thread::sleep(d / self.factor);
    }
}

/// Single experiment-wide deadline. Tasks poll it between transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Timestamp,
}

impl Deadline {
    pub fn after(clock: &dyn Clock, d: Duration) -> Self {
        Self {
            at: clock.now().saturating_add(d),
        }
    }

    pub fn at(&self) -> Timestamp {
        self.at
    }
}

/// Virtual clock: time only moves when someone sleeps on it. Meant for
/// single-threaded tests; concurrent sleepers would race each other ahead.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.now
            .fetch_add(Timestamp::from_duration(d).0, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now.load(Ordering::SeqCst))
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}
