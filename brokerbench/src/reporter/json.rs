use super::Reporter;
use crate::metrics::Snapshot;

#[derive(Debug, Default)]
struct Totals {
    sent: u64,
    failed: u64,
    intervals: u64,
}

/// Prints one JSON object per interval (and a final one) to stdout.
pub struct JsonlReporter {
    topic: String,
    totals: Totals,
}

impl JsonlReporter {
    pub fn new(topic: String) -> Self {
        Self {
            topic,
            totals: Totals::default(),
        }
    }

    fn summary(&mut self, s: &Snapshot) -> serde_json::Value {
        self.totals.sent += s.sent;
        self.totals.failed += s.failed;
        self.totals.intervals += 1;

        serde_json::json!({
            "type": "summary",
            "ts": humantime::format_rfc3339_seconds(s.ts).to_string(),
            "topic": self.topic,
            "interval_ms": s.elapsed.as_millis(),
            "sent": s.sent,
            "failed": s.failed,
            "samples": s.samples,
            "messages_per_sec": s.messages_per_sec(),
            "raw_rate": s.raw_rate,
            "raw_rate_display": s.raw_rate_display().to_string(),
            "tail_latency_ms": s.tail_latency_ms(),
            "total": {
                "sent": self.totals.sent,
                "failed": self.totals.failed,
            },
        })
    }

    fn final_line(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "final",
            "topic": self.topic,
            "intervals": self.totals.intervals,
            "total": {
                "sent": self.totals.sent,
                "failed": self.totals.failed,
            },
        })
    }
}

impl Reporter for JsonlReporter {
    fn on_snapshot(&mut self, snapshot: &Snapshot) {
        let line = self.summary(snapshot);
        println!("{}", line);
    }

    fn finish(&mut self) {
        println!("{}", self.final_line());
    }
}
