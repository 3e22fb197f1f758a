//! Update policies and the per-tick operations they compose.
//!
//! A controller defines one full-tick algorithm over a [`TickContext`]:
//! fetch the component snapshot, propagate couplings, fan out component
//! updates, wait for completion. [`ParallelController`] is the default;
//! [`SerialController`] steps components one at a time. Policies are
//! selected at configuration time and swapped only while the engine is
//! stopped.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;

use conflux_core::{Component, CouplingError, CouplingManager, SlotId, TickId, Workspace};

use crate::notify::Notification;
use crate::pool::WorkerPool;
use crate::signal::CompletionSignal;

/// How a tick ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Couplings propagated and every component completed; the tick
    /// counter advances.
    Completed,
    /// The component snapshot was empty. Nothing ran, nothing was
    /// notified, and the tick counter does not advance.
    NoComponents,
}

/// One full-tick update policy.
///
/// `run_tick` executes on the driver thread once per tick. An `Err`
/// (or a panic) is recovered at the driver loop level: the failure is
/// reported once and the loop continues with the next tick.
pub trait UpdateController: Send + Sync {
    /// Policy name, surfaced through `controller_name()`.
    fn name(&self) -> &str;

    /// Execute one tick over the given context.
    fn run_tick(&self, ctx: &TickContext<'_>) -> Result<TickOutcome, CouplingError>;
}

/// Per-tick operations available to a controller.
///
/// Borrowed for the duration of a single tick; the tick id is fixed at
/// construction so every notification submitted through the context
/// carries it by value.
pub struct TickContext<'a> {
    workspace: &'a dyn Workspace,
    couplings: &'a dyn CouplingManager,
    pool: &'a WorkerPool,
    events: Sender<Notification>,
    tick: TickId,
}

impl<'a> TickContext<'a> {
    pub(crate) fn new(
        workspace: &'a dyn Workspace,
        couplings: &'a dyn CouplingManager,
        pool: &'a WorkerPool,
        events: Sender<Notification>,
        tick: TickId,
    ) -> Self {
        Self {
            workspace,
            couplings,
            pool,
            events,
            tick,
        }
    }

    /// The tick this context belongs to.
    pub fn tick(&self) -> TickId {
        self.tick
    }

    /// Fetch a snapshot of the current component list.
    pub fn components(&self) -> Vec<Arc<dyn Component>> {
        self.workspace.components()
    }

    /// Propagate all couplings synchronously on the calling (driver)
    /// thread, then fire the `couplings_updated` notification.
    ///
    /// Runs before any component update of the same tick so that
    /// every component reads fully-settled values from the previous
    /// tick.
    pub fn update_couplings(&self) -> Result<(), CouplingError> {
        self.couplings.update_all_couplings()?;
        let _ = self.events.send(Notification::CouplingsUpdated { tick: self.tick });
        Ok(())
    }

    /// Schedule one component's update against `tick_signal`.
    ///
    /// Disabled components and components with no update parts count
    /// toward the barrier immediately and fire no notifications.
    /// Otherwise one pool task is submitted per part, chained to the
    /// tick signal through a per-component signal: the first part to
    /// begin executing fires `component_update_started`, and the part
    /// whose completion satisfies the component signal fires
    /// `component_update_finished`, each with the executing worker's
    /// slot. A part that returns `Err` or panics is reported once via
    /// `update_failed` and still counts as done, so one failing part
    /// can never deadlock the tick.
    pub fn update_component(&self, component: &Arc<dyn Component>, tick_signal: &CompletionSignal) {
        if !component.is_update_enabled() {
            tick_signal.done();
            return;
        }

        let parts = component.update_parts();
        if parts.is_empty() {
            tick_signal.done();
            return;
        }

        let component_signal = CompletionSignal::chained(parts.len(), tick_signal);
        let started = Arc::new(AtomicBool::new(false));
        for part in parts {
            let component = Arc::clone(component);
            let signal = component_signal.clone();
            let started = Arc::clone(&started);
            let events = self.events.clone();
            let tick = self.tick;
            self.pool.submit(Box::new(move || {
                let slot = WorkerPool::current_slot().unwrap_or(SlotId(0));
                if !started.swap(true, Ordering::SeqCst) {
                    let _ = events.send(Notification::ComponentStarted {
                        component: Arc::clone(&component),
                        tick,
                        slot,
                    });
                }

                match panic::catch_unwind(AssertUnwindSafe(|| part.run())) {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        let _ = events.send(Notification::UpdateFailed {
                            component: Some(component.name().to_string()),
                            tick,
                            reason: err.to_string(),
                        });
                    }
                    Err(payload) => {
                        let _ = events.send(Notification::UpdateFailed {
                            component: Some(component.name().to_string()),
                            tick,
                            reason: panic_reason(payload.as_ref()),
                        });
                    }
                }

                if signal.done() {
                    let _ = events.send(Notification::ComponentFinished {
                        component,
                        tick,
                        slot,
                    });
                }
            }));
        }
    }
}

/// Best-effort human-readable panic payload.
pub(crate) fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

// ── ParallelController ───────────────────────────────────────────

/// The default policy: couplings on the driver, then every enabled
/// component's parts fanned out to the pool behind a tick-level
/// barrier.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParallelController;

impl UpdateController for ParallelController {
    fn name(&self) -> &str {
        "parallel"
    }

    fn run_tick(&self, ctx: &TickContext<'_>) -> Result<TickOutcome, CouplingError> {
        let components = ctx.components();
        if components.is_empty() {
            return Ok(TickOutcome::NoComponents);
        }

        ctx.update_couplings()?;

        let tick_signal = CompletionSignal::new(components.len());
        for component in &components {
            ctx.update_component(component, &tick_signal);
        }
        tick_signal.wait();
        Ok(TickOutcome::Completed)
    }
}

// ── SerialController ─────────────────────────────────────────────

/// Alternative policy: components step strictly one at a time, in
/// snapshot order. A component's own parts still run on the pool.
/// Useful when component updates contend on an external resource.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialController;

impl UpdateController for SerialController {
    fn name(&self) -> &str {
        "serial"
    }

    fn run_tick(&self, ctx: &TickContext<'_>) -> Result<TickOutcome, CouplingError> {
        let components = ctx.components();
        if components.is_empty() {
            return Ok(TickOutcome::NoComponents);
        }

        ctx.update_couplings()?;

        for component in &components {
            let signal = CompletionSignal::new(1);
            ctx.update_component(component, &signal);
            signal.wait();
        }
        Ok(TickOutcome::Completed)
    }
}
