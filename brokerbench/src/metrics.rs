use std::{
    fmt,
    time::{Duration, SystemTime},
};

use parking_lot::Mutex;

/// Raw rate (in bytes-equivalent units) from which we report in Mb instead of KB.
const MEGABIT_THRESHOLD: f64 = 131_072.;

/// Counters and latency samples shared by every send lane.
///
/// Recording and snapshotting go through the same lock, so a sample
/// always lands in exactly one reporting interval.
#[derive(Debug, Default)]
pub struct Metrics {
    state: Mutex<IntervalState>,
}

#[derive(Debug, Default)]
struct IntervalState {
    sent: u64,
    failed: u64,
    samples: Vec<Duration>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one successful send, keeping its latency if it was measured.
    ///
    /// Dry-run lanes pass `None` as nothing was transmitted.
    pub fn record_success(&self, latency: Option<Duration>) {
        let mut state = self.state.lock();
        state.sent += 1;
        if let Some(latency) = latency {
            state.samples.push(latency);
        }
    }

    /// Count one failed send. Failures never contribute a latency sample.
    pub fn record_failure(&self) {
        self.state.lock().failed += 1;
    }

    /// Take the state of the interval that just ended and start a new one.
    pub fn snapshot_and_reset(
        &self,
        elapsed: Duration,
        message_size: usize,
        lanes_per_group: usize,
    ) -> Snapshot {
        let IntervalState {
            sent,
            failed,
            mut samples,
        } = std::mem::take(&mut *self.state.lock());

        let raw_rate = if sent == 0 {
            0.
        } else {
            (sent as f64 / lanes_per_group.max(1) as f64) * message_size as f64
        };

        Snapshot {
            ts: SystemTime::now(),
            elapsed,
            sent,
            failed,
            samples: samples.len(),
            raw_rate,
            tail_latency: tail_latency(&mut samples),
        }
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> (u64, u64, usize) {
        let state = self.state.lock();
        (state.sent, state.failed, state.samples.len())
    }
}

/// Mean of the slowest 10% of the given samples, zero if there are none.
///
/// The samples are sorted in place.
pub fn tail_latency(samples: &mut [Duration]) -> Duration {
    if samples.is_empty() {
        return Duration::ZERO;
    }
    samples.sort_unstable();

    let start = (samples.len() as f64 * 0.9) as usize;
    let tail = &samples[start..];
    tail.iter().sum::<Duration>() / tail.len() as u32
}

/// Statistics of one reporting interval.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    pub ts: SystemTime,
    pub elapsed: Duration,
    pub sent: u64,
    pub failed: u64,
    pub samples: usize,
    /// `sent / lanes_per_group * message_size`.
    ///
    /// A byte-rate proxy which only equals bytes/sec
    /// while the fan-out matches the reporting interval in seconds.
    pub raw_rate: f64,
    pub tail_latency: Duration,
}

impl Snapshot {
    pub fn messages_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0. {
            0.
        } else {
            self.sent as f64 / secs
        }
    }

    pub fn raw_rate_display(&self) -> RawRate {
        RawRate(self.raw_rate)
    }

    pub fn tail_latency_ms(&self) -> f64 {
        self.tail_latency.as_secs_f64() * 1000.
    }
}

/// Human formatting of [`Snapshot::raw_rate`].
#[derive(Debug, Clone, Copy)]
pub struct RawRate(pub f64);

impl fmt::Display for RawRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= MEGABIT_THRESHOLD {
            write!(f, "{:.0}Mb/sec", self.0 / MEGABIT_THRESHOLD)
        } else {
            write!(f, "{:.0}KB/sec", self.0 / 1024.)
        }
    }
}
