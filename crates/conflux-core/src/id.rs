//! Strongly-typed identifiers used across the engine.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Monotonically increasing tick counter.
///
/// Incremented by the coordinator each time a full workspace update
/// (couplings + components) completes. Never decremented, never reset
/// while the engine is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickId(pub u64);

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TickId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Counter for unique [`SlotId`] allocation.
static SLOT_COUNTER: AtomicU32 = AtomicU32::new(1);

/// Label for a worker-pool thread.
///
/// Allocated from a monotonic atomic counter via [`SlotId::next`] when
/// the worker is spawned, so listener notifications can report which
/// worker ran a given component. Diagnostic value only: ids are
/// distinct while the workers are alive, and a pool replacement
/// allocates fresh ids rather than reusing old ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

impl SlotId {
    /// Allocate a fresh slot id. Thread-safe.
    pub fn next() -> Self {
        Self(SLOT_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counter for unique [`ListenerId`] allocation.
static LISTENER_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Registration handle for an update listener.
///
/// Returned by `add_listener` and accepted by `remove_listener`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl ListenerId {
    /// Allocate a fresh listener id. Thread-safe.
    pub fn next() -> Self {
        Self(LISTENER_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_ids_are_distinct() {
        let a = SlotId::next();
        let b = SlotId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn listener_ids_are_distinct() {
        let a = ListenerId::next();
        let b = ListenerId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn tick_id_display() {
        assert_eq!(TickId(7).to_string(), "7");
    }
}
