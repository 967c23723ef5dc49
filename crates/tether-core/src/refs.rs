//! Per-topic message reference allocation.
//!
//! Each topic counts its own refs for the lifetime of one connection. Ref 1
//! always belongs to the topic's join.

use std::collections::HashMap;
use tether_protocol::Ref;
use tracing::trace;

/// Allocates message refs per topic.
#[derive(Debug, Default)]
pub struct RefAllocator {
    last: HashMap<String, Ref>,
}

impl RefAllocator {
    /// Create an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next ref for a topic.
    ///
    /// Returns 1 on the first call for a topic since it was last discarded
    /// or the table was cleared.
    pub fn next_ref(&mut self, topic: &str) -> Ref {
        let last = self.last.entry(topic.to_string()).or_insert(0);
        *last += 1;
        trace!(topic, reference = *last, "Allocated ref");
        *last
    }

    /// The last ref allocated for a topic.
    #[must_use]
    pub fn current(&self, topic: &str) -> Option<Ref> {
        self.last.get(topic).copied()
    }

    /// Forget a topic, so its next ref is 1 again.
    ///
    /// Returns `true` if the topic had an entry.
    pub fn discard(&mut self, topic: &str) -> bool {
        self.last.remove(topic).is_some()
    }

    /// Forget every topic.
    pub fn clear(&mut self) {
        self.last.clear();
    }

    /// Number of topics with an entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.last.len()
    }

    /// Check if no topic has an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}
