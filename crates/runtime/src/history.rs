//! Bounded record of terminal action results.

use std::collections::VecDeque;
use std::sync::Mutex;

use deskpilot_core::ActionResult;

/// Most-recent-N ring of terminal results.
///
/// Appends from concurrent executions serialize behind one lock; when the
/// ring is full the oldest entry is evicted so the newest always lands.
#[derive(Debug)]
pub struct ExecutionHistory {
    entries: Mutex<VecDeque<ActionResult>>,
    capacity: usize,
}

impl ExecutionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Record one terminal result. A zero-capacity history records nothing.
    pub fn push(&self, result: ActionResult) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(result);
    }

    /// Up to `limit` most recent results, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<ActionResult> {
        let entries = self.entries.lock().unwrap();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
