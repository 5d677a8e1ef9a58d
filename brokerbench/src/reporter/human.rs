use super::Reporter;
use crate::metrics::Snapshot;

/// Prints one status line per interval to stdout.
pub struct HumanReporter {
    topic: String,
}

impl HumanReporter {
    pub fn new(topic: String) -> Self {
        Self { topic }
    }

    pub(super) fn status_line(&self, s: &Snapshot) -> String {
        format!(
            "{} Producing {} raw data @ {:.0} messages/sec | topic: {} | {:.2}ms avg latency",
            humantime::format_rfc3339_seconds(s.ts),
            s.raw_rate_display(),
            s.messages_per_sec(),
            self.topic,
            s.tail_latency_ms(),
        )
    }
}

impl Reporter for HumanReporter {
    fn on_snapshot(&mut self, snapshot: &Snapshot) {
        println!("{}", self.status_line(snapshot));
    }

    fn finish(&mut self) {
        println!();
    }
}
