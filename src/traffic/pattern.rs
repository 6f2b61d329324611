use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::Protocol;

/// Inclusive `[min, max]` range sampled uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRange {
    pub min: u64,
    pub max: u64,
}

impl SizeRange {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub const fn fixed(v: u64) -> Self {
        Self { min: v, max: v }
    }

    pub fn sample(&self, rng: &mut fastrand::Rng) -> u64 {
        rng.u64(self.min..=self.max)
    }
}

/// Traffic shape of a class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrafficPattern {
    /// Request src -> dst, response dst -> src, then think time.
    BurstyRequestResponse {
        request_bytes: SizeRange,
        response_bytes: SizeRange,
        think_time_ms: SizeRange,
    },
    /// `bitrate_bps × chunk_interval` worth of data every chunk interval.
    ConstantBitrateStream {
        bitrate_bps: u64,
        #[serde(default = "default_chunk_interval_ms")]
        chunk_interval_ms: u64,
    },
    /// Small payload at a fixed interval.
    PeriodicSmallPayload {
        payload_bytes: SizeRange,
        interval_ms: u64,
    },
}

fn default_chunk_interval_ms() -> u64 {
    100
}

/// How a task waits before its next exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Wait this long after the exchange completes.
    AfterCompletion(Duration),
    /// Start exchanges on a fixed period.
    FixedInterval(Duration),
}

/// One unit of work for a generator task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exchange {
    pub request_bytes: u64,
    pub response_bytes: Option<u64>,
    pub pacing: Pacing,
}

impl TrafficPattern {
    /// HTTP-like exchanges: 100..1000 B requests, 1..100 KB responses,
    /// 0.5..2 s think time.
    pub fn web() -> Self {
        TrafficPattern::BurstyRequestResponse {
            request_bytes: SizeRange::new(100, 1_000),
            response_bytes: SizeRange::new(1_000, 100_000),
            think_time_ms: SizeRange::new(500, 2_000),
        }
    }

    /// 720p stream at 5 Mbit/s.
    pub fn video() -> Self {
        Self::constant_bitrate(5_000_000)
    }

    pub fn constant_bitrate(bitrate_bps: u64) -> Self {
        TrafficPattern::ConstantBitrateStream {
            bitrate_bps,
            chunk_interval_ms: default_chunk_interval_ms(),
        }
    }

    /// 50..200 B sensor readings once per second.
    pub fn iot() -> Self {
        TrafficPattern::PeriodicSmallPayload {
            payload_bytes: SizeRange::new(50, 200),
            interval_ms: 1_000,
        }
    }

    pub fn default_protocol(&self) -> Protocol {
        match self {
            TrafficPattern::BurstyRequestResponse { .. } => Protocol::Tcp,
            TrafficPattern::ConstantBitrateStream { .. } => Protocol::Udp,
            TrafficPattern::PeriodicSmallPayload { .. } => Protocol::Icmp,
        }
    }

    pub fn is_request_response(&self) -> bool {
        matches!(self, TrafficPattern::BurstyRequestResponse { .. })
    }

    pub fn validate(&self) -> Result<(), String> {
        let range = |name: &str, r: &SizeRange| {
            if r.min > r.max {
                Err(format!("{name}: min {} > max {}", r.min, r.max))
            } else {
                Ok(())
            }
        };
        match self {
            TrafficPattern::BurstyRequestResponse {
                request_bytes,
                response_bytes,
                think_time_ms,
            } => {
                range("request_bytes", request_bytes)?;
                range("response_bytes", response_bytes)?;
                range("think_time_ms", think_time_ms)?;
                if request_bytes.max == 0 {
                    return Err("request_bytes must allow a non-empty request".into());
                }
                if think_time_ms.min == 0 {
                    return Err("think_time_ms must be > 0".into());
                }
            }
            TrafficPattern::ConstantBitrateStream {
                bitrate_bps,
                chunk_interval_ms,
            } => {
                if *bitrate_bps == 0 {
                    return Err("bitrate_bps must be > 0".into());
                }
                if *chunk_interval_ms == 0 {
                    return Err("chunk_interval_ms must be > 0".into());
                }
            }
            TrafficPattern::PeriodicSmallPayload {
                payload_bytes,
                interval_ms,
            } => {
                range("payload_bytes", payload_bytes)?;
                if *interval_ms == 0 {
                    return Err("interval_ms must be > 0".into());
                }
            }
        }
        Ok(())
    }

    pub fn next_exchange(&self, rng: &mut fastrand::Rng) -> Exchange {
        match self {
            TrafficPattern::BurstyRequestResponse {
                request_bytes,
                response_bytes,
                think_time_ms,
            } => Exchange {
                request_bytes: request_bytes.sample(rng),
                response_bytes: Some(response_bytes.sample(rng)),
                pacing: Pacing::AfterCompletion(Duration::from_millis(think_time_ms.sample(rng))),
            },
            TrafficPattern::ConstantBitrateStream {
                bitrate_bps,
                chunk_interval_ms,
            } => Exchange {
                request_bytes: bitrate_bps.saturating_mul(*chunk_interval_ms) / 8_000,
                response_bytes: None,
                pacing: Pacing::FixedInterval(Duration::from_millis(*chunk_interval_ms)),
            },
            TrafficPattern::PeriodicSmallPayload {
                payload_bytes,
                interval_ms,
            } => Exchange {
                request_bytes: payload_bytes.sample(rng),
                response_bytes: None,
                pacing: Pacing::FixedInterval(Duration::from_millis(*interval_ms)),
            },
        }
    }
}
