//! Task synchronization hook.
//!
//! An optional external bracket around the driver loop, letting an
//! external actor (typically a UI event loop) pause, resume, and flush
//! its own pending work at deterministic points relative to ticks.

/// External bracket invoked around the driver loop and after each tick.
///
/// The driver calls `queue_tasks()` before entering the loop,
/// `run_tasks()` after every tick attempt, and `release_tasks()`
/// followed by a final `run_tasks()` when the loop exits. All methods
/// default to no-ops.
pub trait TaskSyncHook: Send + Sync {
    /// Begin queueing external tasks instead of running them.
    fn queue_tasks(&self) {}

    /// Stop queueing; external tasks run normally again.
    fn release_tasks(&self) {}

    /// Run any queued external tasks now.
    fn run_tasks(&self) {}
}

/// Hook whose methods do nothing. Installed when no hook is set.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHook;

impl TaskSyncHook for NoopHook {}
