mod human;
mod json;

pub use self::{human::HumanReporter, json::JsonlReporter};

use crate::metrics::Snapshot;

/// Sink for the statistics produced at the end of every reporting interval.
pub trait Reporter: Send + Sync + 'static {
    fn on_snapshot(&mut self, snapshot: &Snapshot);
    fn finish(&mut self);
}
