use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one in-flight generation request.
///
/// Ids are handed out in increasing order by a single dispatcher and never
/// reused by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Number of background workers. With one worker, requests are processed
    /// strictly in submission order.
    pub workers: usize,
    /// Thread name prefix; workers are suffixed with their index.
    pub thread_name: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            thread_name: "relief-mesh".into(),
        }
    }
}

/// Counters reported by `MeshDispatcher::poll`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Progress messages relayed to a pending request.
    pub progress: usize,
    /// Requests completed (successfully or not) and removed from the registry.
    pub completed: usize,
    /// Messages whose id matched no pending request.
    pub unmatched: usize,
}

impl PollStats {
    pub(crate) fn absorb(&mut self, other: PollStats) {
        self.progress += other.progress;
        self.completed += other.completed;
        self.unmatched += other.unmatched;
    }
}
