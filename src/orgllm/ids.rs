//! Monotonic identifier allocation.
//!
//! Agent ids and message ids come from two independent [`IdAllocator`]s, both
//! persisted as part of the organization snapshot (`id_count` in the org
//! record, `max_id` in the message archive). Ids are never recycled, even
//! after an agent is fired or the process restarts — historical messages and
//! conversation prompts stay unambiguous forever.

use serde::{Deserialize, Serialize};

/// A strictly monotonic integer id source.
///
/// The first allocated id is `1`; `0` is never handed out, which keeps the
/// zero value free as an "unset" sentinel in configs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdAllocator {
    count: u64,
}

impl IdAllocator {
    /// Start a fresh allocator at zero.
    pub fn new() -> Self {
        Self { count: 0 }
    }

    /// Resume an allocator from a persisted high-water mark.
    pub fn from_count(count: u64) -> Self {
        Self { count }
    }

    /// Allocate the next id.
    pub fn next_id(&mut self) -> u64 {
        self.count += 1;
        self.count
    }

    /// The highest id allocated so far (the persisted value).
    pub fn count(&self) -> u64 {
        self.count
    }
}
