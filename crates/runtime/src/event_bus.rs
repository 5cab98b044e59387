use std::collections::VecDeque;

use crate::seq::Seq;

/// One command or notable decision, tagged with the transition that caused it.
///
/// `kind` is a short stable tag (`"camera.focus"`, `"popup.mount"`, ...);
/// `message` is free-form detail for logs and debug UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub seq: Seq,
    pub kind: &'static str,
    pub message: String,
}

pub const DEFAULT_TRACE_CAPACITY: usize = 512;

/// Bounded trace of issued commands. Once full, the oldest event is
/// dropped for every new one. A capacity of `0` records nothing.
#[derive(Debug)]
pub struct EventBus {
    events: VecDeque<Event>,
    capacity: usize,
    dropped: u64,
}

impl EventBus {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_TRACE_CAPACITY)),
            capacity,
            dropped: 0,
        }
    }

    pub fn emit(&mut self, seq: Seq, kind: &'static str, message: impl Into<String>) {
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(Event {
            seq,
            kind,
            message: message.into(),
        });
    }

    /// Retained events, oldest first.
    pub fn events(&self) -> &VecDeque<Event> {
        &self.events
    }

    /// Number of retained events with the given `kind`.
    pub fn count(&self, kind: &str) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    /// Events evicted or never recorded because of the capacity.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
