//! Single-thread event delivery, decoupled from the worker pool.
//!
//! The driver and pool workers enqueue notifications and never call
//! listener code directly, eliminating re-entrancy and deadlock risk.
//! The event thread drains an unbounded channel strictly FIFO, so
//! notifications from the same tick are delivered in submission order.
//! Delivery is not synchronized with tick boundaries: tick N's
//! notifications may land after tick N+1 has started on the driver.

use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use indexmap::IndexMap;

use conflux_core::{Component, ListenerId, SlotId, TickId, UpdateListener};

/// One lifecycle event, captured by value at submission time.
#[derive(Clone)]
pub(crate) enum Notification {
    ComponentStarted {
        component: Arc<dyn Component>,
        tick: TickId,
        slot: SlotId,
    },
    ComponentFinished {
        component: Arc<dyn Component>,
        tick: TickId,
        slot: SlotId,
    },
    CouplingsUpdated {
        tick: TickId,
    },
    ThreadCountChanged {
        threads: usize,
    },
    UpdateFailed {
        component: Option<String>,
        tick: TickId,
        reason: String,
    },
}

type Registry = Arc<RwLock<IndexMap<ListenerId, Arc<dyn UpdateListener>>>>;

/// Dedicated delivery context for [`UpdateListener`] callbacks.
///
/// Listener registrations may be added and removed at any time,
/// including while a notification is being delivered: dispatch
/// snapshots the registry under a read lock before calling out, so
/// in-flight delivery never observes a half-mutated set.
pub struct EventNotifier {
    tx: Option<Sender<Notification>>,
    registry: Registry,
    thread: Option<JoinHandle<()>>,
}

impl EventNotifier {
    /// Spawn the event thread.
    ///
    /// # Panics
    ///
    /// Panics if the event thread cannot be spawned.
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded::<Notification>();
        let registry: Registry = Arc::new(RwLock::new(IndexMap::new()));
        let dispatch_registry = Arc::clone(&registry);
        let thread = thread::Builder::new()
            .name("conflux-events".into())
            .spawn(move || event_loop(rx, dispatch_registry))
            .expect("failed to spawn event thread");
        Self {
            tx: Some(tx),
            registry,
            thread: Some(thread),
        }
    }

    /// Register a listener. Returns the handle for later removal.
    pub fn add_listener(&self, listener: Arc<dyn UpdateListener>) -> ListenerId {
        let id = ListenerId::next();
        self.registry
            .write()
            .expect("listener registry lock poisoned")
            .insert(id, listener);
        id
    }

    /// Remove a listener. Returns whether the handle was registered.
    ///
    /// A notification already being delivered to the removed listener
    /// still completes; subsequent notifications skip it.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.registry
            .write()
            .expect("listener registry lock poisoned")
            .shift_remove(&id)
            .is_some()
    }

    /// Enqueue a notification. Fire-and-forget, never blocks.
    pub(crate) fn submit(&self, notification: Notification) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(notification);
        }
    }

    /// A cloneable submission handle for pool tasks and the driver.
    pub(crate) fn sender(&self) -> Sender<Notification> {
        self.tx
            .as_ref()
            .expect("event notifier already shut down")
            .clone()
    }
}

impl Default for EventNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventNotifier {
    fn drop(&mut self) {
        // Closing the channel ends the event loop after the queue
        // drains, so every submitted notification is still delivered.
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn event_loop(rx: Receiver<Notification>, registry: Registry) {
    while let Ok(notification) = rx.recv() {
        // Snapshot under the read lock, call out without it.
        let targets: Vec<Arc<dyn UpdateListener>> = registry
            .read()
            .expect("listener registry lock poisoned")
            .values()
            .cloned()
            .collect();
        for listener in targets {
            match &notification {
                Notification::ComponentStarted {
                    component,
                    tick,
                    slot,
                } => listener.component_update_started(component, *tick, *slot),
                Notification::ComponentFinished {
                    component,
                    tick,
                    slot,
                } => listener.component_update_finished(component, *tick, *slot),
                Notification::CouplingsUpdated { tick } => listener.couplings_updated(*tick),
                Notification::ThreadCountChanged { threads } => {
                    listener.thread_count_changed(*threads)
                }
                Notification::UpdateFailed {
                    component,
                    tick,
                    reason,
                } => listener.update_failed(component.as_deref(), *tick, reason),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_test_utils::{ListenerEvent, RecordingListener};

    #[test]
    fn notifications_are_delivered_in_submission_order() {
        let notifier = EventNotifier::new();
        let listener = Arc::new(RecordingListener::new());
        notifier.add_listener(listener.clone());

        for t in 0..10 {
            notifier.submit(Notification::CouplingsUpdated { tick: TickId(t) });
        }
        drop(notifier); // joins the event thread after the queue drains

        let ticks: Vec<u64> = listener
            .events()
            .into_iter()
            .map(|e| match e {
                ListenerEvent::Couplings { tick } => tick.0,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(ticks, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn removed_listener_receives_nothing_further() {
        let notifier = EventNotifier::new();
        let listener = Arc::new(RecordingListener::new());
        let id = notifier.add_listener(listener.clone());

        notifier.submit(Notification::ThreadCountChanged { threads: 2 });
        listener.wait_for_events(1);

        assert!(notifier.remove_listener(id));
        assert!(!notifier.remove_listener(id), "double remove");
        notifier.submit(Notification::ThreadCountChanged { threads: 4 });
        drop(notifier);

        assert_eq!(listener.events().len(), 1);
    }

    #[test]
    fn pending_notifications_survive_drop() {
        let notifier = EventNotifier::new();
        let listener = Arc::new(RecordingListener::new());
        notifier.add_listener(listener.clone());
        for t in 0..100 {
            notifier.submit(Notification::CouplingsUpdated { tick: TickId(t) });
        }
        drop(notifier);
        assert_eq!(listener.events().len(), 100);
    }

    #[test]
    fn listener_added_mid_stream_sees_later_events_only() {
        let notifier = EventNotifier::new();
        let early = Arc::new(RecordingListener::new());
        notifier.add_listener(early.clone());

        notifier.submit(Notification::CouplingsUpdated { tick: TickId(1) });
        early.wait_for_events(1);

        let late = Arc::new(RecordingListener::new());
        notifier.add_listener(late.clone());
        notifier.submit(Notification::CouplingsUpdated { tick: TickId(2) });
        drop(notifier);

        assert_eq!(early.events().len(), 2);
        assert_eq!(late.events().len(), 1);
    }
}
