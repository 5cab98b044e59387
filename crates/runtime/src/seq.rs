use serde::{Deserialize, Serialize};

/// Transition sequence number.
///
/// Every state transition that issues asynchronous work (camera animation,
/// popup mount) takes a fresh `Seq`. Completion handlers compare the `Seq`
/// they carry against the one currently in flight and drop stale ones.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seq(u64);

impl Seq {
    pub const fn new(n: u64) -> Self {
        Seq(n)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Seq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic `Seq` source. The first issued value is `Seq(1)`, so
/// `Seq::default()` never matches a live transition.
#[derive(Debug, Default)]
pub struct SeqCounter {
    last: u64,
}

impl SeqCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> Seq {
        self.last = self.last.wrapping_add(1);
        Seq(self.last)
    }

    /// Most recently issued value.
    pub fn current(&self) -> Seq {
        Seq(self.last)
    }
}
