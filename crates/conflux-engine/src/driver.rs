//! Driver loop, command channel draining, and per-tick failure
//! containment.
//!
//! The driver thread owns the worker pool and the active controller
//! exclusively (moved in via `thread::spawn`). Commands arrive on a
//! bounded crossbeam channel and replies go back via per-command
//! oneshot channels, so pool replacement and controller swaps are
//! serialized with ticks by construction: the driver handles one
//! command at a time and a tick runs entirely within one command.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crossbeam_channel::{Receiver, Sender};

use conflux_core::{CouplingManager, TaskSyncHook, TickId, Workspace};

use crate::controller::{panic_reason, TickContext, TickOutcome, UpdateController};
use crate::notify::Notification;
use crate::pool::WorkerPool;

/// A command submitted to the driver by the coordinator.
pub(crate) enum DriverCommand {
    /// Enter the tick loop; runs until the run flag clears.
    RunLoop,
    /// Execute exactly one tick and reply with the resulting time.
    RunOnce { reply: Sender<TickId> },
    /// Replace the worker pool. Only sent while stopped.
    SetThreads { threads: usize, reply: Sender<usize> },
    /// Swap the update policy. Only sent while stopped.
    SetController {
        controller: Box<dyn UpdateController>,
        reply: Sender<()>,
    },
}

/// Shared state between the coordinator facade and the driver thread.
pub(crate) struct SharedState {
    /// Whether the tick loop should keep running. Observed between
    /// ticks only; an in-flight tick always completes.
    pub run: AtomicBool,
    /// Completed tick count.
    pub time: AtomicU64,
    /// Current pool size, for `num_threads()` without asking the driver.
    pub num_threads: AtomicUsize,
    /// Name of the active controller.
    pub controller_name: RwLock<String>,
    /// The installed synchronization hook.
    pub hook: RwLock<Arc<dyn TaskSyncHook>>,
}

/// State owned by the driver thread's main loop.
pub(crate) struct DriverState {
    pool: WorkerPool,
    controller: Box<dyn UpdateController>,
    workspace: Arc<dyn Workspace>,
    couplings: Arc<dyn CouplingManager>,
    events: Sender<Notification>,
    shared: Arc<SharedState>,
    cmd_rx: Receiver<DriverCommand>,
}

impl DriverState {
    pub fn new(
        pool: WorkerPool,
        controller: Box<dyn UpdateController>,
        workspace: Arc<dyn Workspace>,
        couplings: Arc<dyn CouplingManager>,
        events: Sender<Notification>,
        shared: Arc<SharedState>,
        cmd_rx: Receiver<DriverCommand>,
    ) -> Self {
        Self {
            pool,
            controller,
            workspace,
            couplings,
            events,
            shared,
            cmd_rx,
        }
    }

    /// Main command loop. Returns when the coordinator drops the
    /// command sender; dropping `self` then joins the pool workers.
    pub fn run(mut self) {
        while let Ok(cmd) = self.cmd_rx.recv() {
            match cmd {
                DriverCommand::RunLoop => self.run_loop(),
                DriverCommand::RunOnce { reply } => {
                    let hook = self.hook();
                    hook.queue_tasks();
                    self.tick();
                    hook.release_tasks();
                    hook.run_tasks();
                    let _ = reply.send(TickId(self.shared.time.load(Ordering::Acquire)));
                }
                DriverCommand::SetThreads { threads, reply } => {
                    self.pool = WorkerPool::new(threads);
                    self.shared.num_threads.store(threads, Ordering::Release);
                    let _ = self
                        .events
                        .send(Notification::ThreadCountChanged { threads });
                    let _ = reply.send(threads);
                }
                DriverCommand::SetController { controller, reply } => {
                    *self
                        .shared
                        .controller_name
                        .write()
                        .expect("controller name lock poisoned") = controller.name().to_string();
                    self.controller = controller;
                    let _ = reply.send(());
                }
            }
        }
    }

    /// The tick loop: runs while the run flag holds, bracketed by the
    /// synchronization hook.
    fn run_loop(&mut self) {
        // A stop() can land before this command is dequeued; a stale
        // loop command must not bracket the hook around zero ticks.
        if !self.shared.run.load(Ordering::Acquire) {
            return;
        }
        let hook = self.hook();
        hook.queue_tasks();
        while self.shared.run.load(Ordering::Acquire) {
            let advanced = self.tick();
            hook.run_tasks();
            if !advanced {
                // Empty workspace or failed tick: don't spin hot.
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        }
        hook.release_tasks();
        hook.run_tasks();
    }

    /// Execute one tick with the active controller.
    ///
    /// The counter advances only on a completed tick; a controller
    /// error or panic is reported once and leaves the counter (and the
    /// engine) intact, so a persistently failing tick degrades that
    /// tick's contribution rather than terminating the run.
    ///
    /// Returns whether the counter advanced.
    fn tick(&mut self) -> bool {
        let tick = TickId(self.shared.time.load(Ordering::Acquire) + 1);
        let ctx = TickContext::new(
            self.workspace.as_ref(),
            self.couplings.as_ref(),
            &self.pool,
            self.events.clone(),
            tick,
        );

        let controller = self.controller.as_ref();
        match panic::catch_unwind(AssertUnwindSafe(|| controller.run_tick(&ctx))) {
            Ok(Ok(TickOutcome::Completed)) => {
                self.shared.time.store(tick.0, Ordering::Release);
                true
            }
            Ok(Ok(TickOutcome::NoComponents)) => false,
            Ok(Err(err)) => {
                let _ = self.events.send(Notification::UpdateFailed {
                    component: None,
                    tick,
                    reason: err.to_string(),
                });
                false
            }
            Err(payload) => {
                let _ = self.events.send(Notification::UpdateFailed {
                    component: None,
                    tick,
                    reason: panic_reason(payload.as_ref()),
                });
                false
            }
        }
    }

    fn hook(&self) -> Arc<dyn TaskSyncHook> {
        Arc::clone(&self.shared.hook.read().expect("hook lock poisoned"))
    }
}
