//! User-facing coordinator: lifecycle, configuration, and listeners.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;

use conflux_core::{
    ConfigError, CouplingManager, ListenerId, NoopHook, TaskSyncHook, TickId, UpdateListener,
    Workspace,
};

use crate::config::EngineConfig;
use crate::controller::{ParallelController, UpdateController};
use crate::driver::{DriverCommand, DriverState, SharedState};
use crate::notify::EventNotifier;
use crate::pool::WorkerPool;

/// The workspace update engine.
///
/// Owns the worker pool and the active controller (both held by a
/// dedicated driver thread), plus the event notifier. The driver
/// repeatedly executes the controller once per tick while the run flag
/// is set, or exactly once on demand via [`run_once`](Self::run_once).
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use conflux_engine::{EngineConfig, UpdateCoordinator};
/// use conflux_test_utils::{CountingCouplings, StaticWorkspace, TestComponent};
///
/// let workspace = Arc::new(StaticWorkspace::new(vec![
///     TestComponent::new("oscillator").with_parts(2).share(),
/// ]));
/// let couplings = Arc::new(CountingCouplings::new());
/// let engine =
///     UpdateCoordinator::new(workspace, couplings, EngineConfig::default()).unwrap();
///
/// let completed = engine.run_once().unwrap();
/// assert_eq!(engine.time(), completed);
/// ```
pub struct UpdateCoordinator {
    shared: Arc<SharedState>,
    cmd_tx: Option<Sender<DriverCommand>>,
    driver: Option<JoinHandle<()>>,
    notifier: EventNotifier,
}

impl UpdateCoordinator {
    /// Spawn the engine: driver thread, worker pool, event thread.
    ///
    /// # Errors
    ///
    /// Currently infallible in practice; returns `Result` so that
    /// future validation does not break the signature.
    pub fn new(
        workspace: Arc<dyn Workspace>,
        couplings: Arc<dyn CouplingManager>,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        let threads = config.resolved_threads();
        let controller: Box<dyn UpdateController> = config
            .controller
            .unwrap_or_else(|| Box::new(ParallelController));

        let shared = Arc::new(SharedState {
            run: AtomicBool::new(false),
            time: AtomicU64::new(0),
            num_threads: AtomicUsize::new(threads),
            controller_name: RwLock::new(controller.name().to_string()),
            hook: RwLock::new(Arc::new(NoopHook) as Arc<dyn TaskSyncHook>),
        });

        let notifier = EventNotifier::new();
        let events = notifier.sender();

        // Commands are rare (lifecycle and config only); a small
        // bounded channel gives natural back-pressure.
        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(16);

        let pool = WorkerPool::new(threads);
        let driver_shared = Arc::clone(&shared);
        let driver = thread::Builder::new()
            .name("conflux-driver".into())
            .spawn(move || {
                let state = DriverState::new(
                    pool,
                    controller,
                    workspace,
                    couplings,
                    events,
                    driver_shared,
                    cmd_rx,
                );
                state.run()
            })
            .expect("failed to spawn driver thread");

        Ok(Self {
            shared,
            cmd_tx: Some(cmd_tx),
            driver: Some(driver),
            notifier,
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Start the tick loop.
    ///
    /// Idempotent: calling while already running does not start a
    /// second driver loop.
    pub fn run(&self) {
        if self.shared.run.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.send(DriverCommand::RunLoop).is_err() {
            self.shared.run.store(false, Ordering::Release);
        }
    }

    /// Request the tick loop to stop.
    ///
    /// Cooperative: the flag is observed between ticks only, so an
    /// in-flight tick always completes. Expect up to one full tick of
    /// latency before execution actually ceases.
    pub fn stop(&self) {
        self.shared.run.store(false, Ordering::Release);
    }

    /// Whether the engine is set to run.
    pub fn is_running(&self) -> bool {
        self.shared.run.load(Ordering::Acquire)
    }

    /// Execute exactly one tick and block until it completes.
    ///
    /// Does not touch the run flag; intended for manual stepping while
    /// stopped. Returns the tick counter value after the tick (which
    /// is unchanged when the workspace was empty).
    ///
    /// # Errors
    ///
    /// [`ConfigError::EngineRunning`] when the loop is running.
    pub fn run_once(&self) -> Result<TickId, ConfigError> {
        if self.is_running() {
            return Err(ConfigError::EngineRunning {
                operation: "run_once",
            });
        }
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.send(DriverCommand::RunOnce { reply: reply_tx })?;
        reply_rx.recv().map_err(|_| ConfigError::DriverUnavailable)
    }

    /// The number of completed ticks.
    pub fn time(&self) -> TickId {
        TickId(self.shared.time.load(Ordering::Acquire))
    }

    // ── Configuration ────────────────────────────────────────────

    /// Current worker pool size.
    pub fn num_threads(&self) -> usize {
        self.shared.num_threads.load(Ordering::Acquire)
    }

    /// Replace the worker pool with `threads` workers.
    ///
    /// Only permitted while stopped; the replacement executes on the
    /// driver thread, so it can never interleave with a tick. Counts
    /// above the engine maximum are clamped, matching
    /// [`EngineConfig::resolved_threads`]. Fires `thread_count_changed`
    /// on success.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidThreadCount`] for zero;
    /// [`ConfigError::EngineRunning`] while the loop is running.
    pub fn set_num_threads(&self, threads: usize) -> Result<(), ConfigError> {
        if threads == 0 {
            return Err(ConfigError::InvalidThreadCount { value: threads });
        }
        let threads = threads.min(crate::config::MAX_THREADS);
        if self.is_running() {
            return Err(ConfigError::EngineRunning {
                operation: "set_num_threads",
            });
        }
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.send(DriverCommand::SetThreads {
            threads,
            reply: reply_tx,
        })?;
        reply_rx
            .recv()
            .map(|_| ())
            .map_err(|_| ConfigError::DriverUnavailable)
    }

    /// Swap the update policy.
    ///
    /// Only permitted while stopped, for the same reason as
    /// [`set_num_threads`](Self::set_num_threads).
    ///
    /// # Errors
    ///
    /// [`ConfigError::EngineRunning`] while the loop is running.
    pub fn set_controller(
        &self,
        controller: Box<dyn UpdateController>,
    ) -> Result<(), ConfigError> {
        if self.is_running() {
            return Err(ConfigError::EngineRunning {
                operation: "set_controller",
            });
        }
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.send(DriverCommand::SetController {
            controller,
            reply: reply_tx,
        })?;
        reply_rx.recv().map_err(|_| ConfigError::DriverUnavailable)
    }

    /// Name of the active controller.
    pub fn controller_name(&self) -> String {
        self.shared
            .controller_name
            .read()
            .expect("controller name lock poisoned")
            .clone()
    }

    /// Install a task synchronization hook; `None` installs the no-op
    /// hook.
    ///
    /// Takes effect at the next loop entry or tick; a loop already
    /// bracketed by the previous hook keeps it until the loop exits.
    pub fn set_sync_hook(&self, hook: Option<Arc<dyn TaskSyncHook>>) {
        *self.shared.hook.write().expect("hook lock poisoned") =
            hook.unwrap_or_else(|| Arc::new(NoopHook));
    }

    // ── Listeners ────────────────────────────────────────────────

    /// Register a lifecycle listener.
    pub fn add_listener(&self, listener: Arc<dyn UpdateListener>) -> ListenerId {
        self.notifier.add_listener(listener)
    }

    /// Remove a lifecycle listener. Returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.notifier.remove_listener(id)
    }

    fn send(&self, cmd: DriverCommand) -> Result<(), ConfigError> {
        self.cmd_tx
            .as_ref()
            .ok_or(ConfigError::DriverUnavailable)?
            .send(cmd)
            .map_err(|_| ConfigError::DriverUnavailable)
    }
}

impl Drop for UpdateCoordinator {
    fn drop(&mut self) {
        self.shared.run.store(false, Ordering::Release);
        // Closing the command channel ends the driver's command loop;
        // the driver drops the pool (joining workers) on exit. The
        // notifier is a field, dropped afterwards, so notifications
        // submitted by the final tick still get delivered.
        self.cmd_tx.take();
        if let Some(driver) = self.driver.take() {
            let _ = driver.join();
        }
    }
}

impl std::fmt::Debug for UpdateCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateCoordinator")
            .field("time", &self.time())
            .field("running", &self.is_running())
            .field("num_threads", &self.num_threads())
            .field("controller", &self.controller_name())
            .finish()
    }
}
