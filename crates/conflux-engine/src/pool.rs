//! Fixed-size worker pool for update parts.
//!
//! Workers drain a shared unbounded channel, so submission never
//! blocks the driver. There is no ordering guarantee among submitted
//! tasks; correctness of a tick rests entirely on the completion
//! signals, not on execution order. Each worker is labeled with a
//! fresh [`SlotId`] at spawn time and publishes it through a
//! thread-local so the task it is running can report which worker
//! executed it.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use conflux_core::SlotId;

/// A unit of work submitted to the pool.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

thread_local! {
    static CURRENT_SLOT: Cell<Option<SlotId>> = const { Cell::new(None) };
}

/// Fixed-capacity pool of update worker threads.
///
/// Replacing the pool (resizing) is a coordinator operation permitted
/// only while the engine is stopped; the pool itself is immutable
/// after construction. Dropping the pool closes the task channel and
/// joins every worker.
pub struct WorkerPool {
    tx: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    slots: Vec<SlotId>,
}

impl WorkerPool {
    /// Spawn a pool of `threads` workers.
    ///
    /// # Panics
    ///
    /// Panics if `threads` is zero (the coordinator validates counts
    /// before constructing a pool) or if a worker thread cannot be
    /// spawned.
    pub fn new(threads: usize) -> Self {
        assert!(threads > 0, "worker pool requires at least one thread");

        let (tx, rx) = crossbeam_channel::unbounded::<Task>();
        let mut workers = Vec::with_capacity(threads);
        let mut slots = Vec::with_capacity(threads);
        for _ in 0..threads {
            let slot = SlotId::next();
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("conflux-worker-{slot}"))
                .spawn(move || worker_loop(rx, slot))
                .expect("failed to spawn pool worker");
            workers.push(handle);
            slots.push(slot);
        }

        Self {
            tx: Some(tx),
            workers,
            slots,
        }
    }

    /// Submit a task. Fire-and-forget: never blocks the caller.
    ///
    /// Tasks submitted after the pool started dropping are discarded;
    /// that cannot happen mid-tick because the driver owns the pool
    /// exclusively.
    pub fn submit(&self, task: Task) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(task);
        }
    }

    /// Number of worker threads in this pool.
    pub fn num_threads(&self) -> usize {
        self.workers.len()
    }

    /// Slot ids of this pool's workers, in spawn order.
    pub fn slots(&self) -> &[SlotId] {
        &self.slots
    }

    /// The slot id of the calling worker thread.
    ///
    /// Returns `None` on threads that do not belong to a pool (the
    /// driver, the event thread, user threads).
    pub fn current_slot() -> Option<SlotId> {
        CURRENT_SLOT.with(Cell::get)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel ends every worker's recv loop.
        self.tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(rx: Receiver<Task>, slot: SlotId) {
    CURRENT_SLOT.with(|s| s.set(Some(slot)));
    while let Ok(task) = rx.recv() {
        // A panicking task must not take the worker down with it; the
        // default panic hook still reports it to stderr.
        let _ = panic::catch_unwind(AssertUnwindSafe(task));
    }
}
