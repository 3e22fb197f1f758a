//! Lifecycle listener trait.

use std::sync::Arc;

use crate::component::Component;
use crate::id::{SlotId, TickId};

/// Subscriber to engine lifecycle notifications.
///
/// All methods are delivered on a single dedicated event thread,
/// strictly FIFO relative to submission order, and decoupled from the
/// worker pool: a slow listener can never stall coupling propagation
/// or component execution. Listeners observe ticks asynchronously and
/// must tolerate tick N's notifications arriving after tick N+1 has
/// already started on the driver side.
///
/// All methods default to no-ops so implementors only override what
/// they observe.
pub trait UpdateListener: Send + Sync {
    /// A component's update has started executing.
    ///
    /// `slot` identifies the pool worker that began the component's
    /// first part (diagnostic value only).
    fn component_update_started(&self, component: &Arc<dyn Component>, tick: TickId, slot: SlotId) {
        let _ = (component, tick, slot);
    }

    /// All of a component's update parts have completed.
    fn component_update_finished(&self, component: &Arc<dyn Component>, tick: TickId, slot: SlotId) {
        let _ = (component, tick, slot);
    }

    /// Coupling propagation for the given tick has completed.
    fn couplings_updated(&self, tick: TickId) {
        let _ = tick;
    }

    /// The worker pool was replaced with a new thread count.
    fn thread_count_changed(&self, threads: usize) {
        let _ = threads;
    }

    /// An update part or the tick itself failed.
    ///
    /// `component` is `None` when the failure happened outside any
    /// component (e.g. coupling propagation). Fired exactly once per
    /// failure; the engine remains runnable afterwards.
    fn update_failed(&self, component: Option<&str>, tick: TickId, reason: &str) {
        let _ = (component, tick, reason);
    }
}
