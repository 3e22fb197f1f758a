//! Test utilities and mock types for Conflux development.
//!
//! Provides mock implementations of the core traits ([`Component`],
//! [`Workspace`], [`CouplingManager`], [`UpdateListener`]) plus
//! instrumented update parts for exercising the engine: counting,
//! failing, panicking, and order-tracing variants.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use smallvec::SmallVec;

use conflux_core::{
    Component, CouplingError, CouplingManager, PartError, SlotId, TickId, UpdateListener,
    UpdatePart, Workspace,
};

// ── Update parts ─────────────────────────────────────────────────

/// An update part that counts how many times it has run.
///
/// The counter is shared across clones, so a part handed to a
/// component can be observed from the test afterwards.
#[derive(Clone, Default)]
pub struct CountingPart {
    runs: Arc<AtomicUsize>,
}

impl CountingPart {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `run` has been called, across all clones.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl UpdatePart for CountingPart {
    fn run(&self) -> Result<(), PartError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// An update part that always returns [`PartError::ExecutionFailed`].
#[derive(Clone)]
pub struct FailingPart {
    reason: String,
}

impl FailingPart {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

impl UpdatePart for FailingPart {
    fn run(&self) -> Result<(), PartError> {
        Err(PartError::ExecutionFailed {
            reason: self.reason.clone(),
        })
    }
}

/// An update part that panics with the given message.
#[derive(Clone)]
pub struct PanickingPart {
    message: String,
}

impl PanickingPart {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl UpdatePart for PanickingPart {
    fn run(&self) -> Result<(), PartError> {
        panic!("{}", self.message);
    }
}

/// An update part that sleeps, for tests that need an in-flight tick.
#[derive(Clone)]
pub struct SleepingPart {
    duration: Duration,
    runs: Arc<AtomicUsize>,
}

impl SleepingPart {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl UpdatePart for SleepingPart {
    fn run(&self) -> Result<(), PartError> {
        std::thread::sleep(self.duration);
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// An update part that appends a label to a shared log when it runs.
#[derive(Clone)]
struct TracingPart {
    label: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl UpdatePart for TracingPart {
    fn run(&self) -> Result<(), PartError> {
        self.log
            .lock()
            .expect("trace log lock poisoned")
            .push(self.label.clone());
        Ok(())
    }
}

// ── TestComponent ────────────────────────────────────────────────

#[derive(Clone)]
enum PartSpec {
    Counting,
    Failing(FailingPart),
    Panicking(PanickingPart),
    Sleeping(SleepingPart),
    Tracing(Arc<Mutex<Vec<String>>>),
}

/// A configurable mock [`Component`].
///
/// Built with the `with_*` methods, then handed to the engine via
/// [`share`](TestComponent::share). Clones share the run counter, so
/// the builder kept by the test still observes parts executed through
/// the shared handle. `update_parts` manufactures fresh boxed parts on
/// every call, like a real component would.
#[derive(Clone)]
pub struct TestComponent {
    name: String,
    enabled: bool,
    specs: Vec<PartSpec>,
    runs: Arc<AtomicUsize>,
}

impl TestComponent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            specs: Vec::new(),
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add `n` counting parts.
    pub fn with_parts(mut self, n: usize) -> Self {
        for _ in 0..n {
            self.specs.push(PartSpec::Counting);
        }
        self
    }

    /// Add a failing part.
    pub fn with_part(mut self, part: FailingPart) -> Self {
        self.specs.push(PartSpec::Failing(part));
        self
    }

    /// Add a part that panics with `message`.
    pub fn with_panicking_part(mut self, message: &str) -> Self {
        self.specs.push(PartSpec::Panicking(PanickingPart::new(message)));
        self
    }

    /// Add a part that sleeps for `duration` before counting itself.
    pub fn with_sleeping_part(mut self, duration: Duration) -> Self {
        self.specs.push(PartSpec::Sleeping(SleepingPart::new(duration)));
        self
    }

    /// Add a part that appends this component's name to `log`.
    pub fn with_tracing_part(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.specs.push(PartSpec::Tracing(log));
        self
    }

    /// Mark the component as excluded from updates.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// A shareable handle suitable for a workspace.
    pub fn share(&self) -> Arc<dyn Component> {
        Arc::new(self.clone())
    }

    /// How many parts (of any kind except failing/panicking) have run.
    pub fn parts_run(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

/// Counting part bound to the owning component's shared counter.
struct BoundCountingPart {
    runs: Arc<AtomicUsize>,
}

impl UpdatePart for BoundCountingPart {
    fn run(&self) -> Result<(), PartError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Component for TestComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_update_enabled(&self) -> bool {
        self.enabled
    }

    fn update_parts(&self) -> SmallVec<[Box<dyn UpdatePart>; 4]> {
        self.specs
            .iter()
            .map(|spec| -> Box<dyn UpdatePart> {
                match spec {
                    PartSpec::Counting => Box::new(BoundCountingPart {
                        runs: Arc::clone(&self.runs),
                    }),
                    PartSpec::Failing(part) => Box::new(part.clone()),
                    PartSpec::Panicking(part) => Box::new(part.clone()),
                    PartSpec::Sleeping(part) => Box::new(part.clone()),
                    PartSpec::Tracing(log) => Box::new(TracingPart {
                        label: self.name.clone(),
                        log: Arc::clone(log),
                    }),
                }
            })
            .collect()
    }
}

// ── Workspace and couplings ──────────────────────────────────────

/// A [`Workspace`] over a mutable component list.
///
/// `components()` snapshots under the lock, so the engine never sees a
/// half-mutated list even if a test pushes components concurrently.
pub struct StaticWorkspace {
    components: Mutex<Vec<Arc<dyn Component>>>,
}

impl StaticWorkspace {
    pub fn new(components: Vec<Arc<dyn Component>>) -> Self {
        Self {
            components: Mutex::new(components),
        }
    }

    /// Append a component; visible from the next snapshot on.
    pub fn push(&self, component: Arc<dyn Component>) {
        self.components
            .lock()
            .expect("workspace lock poisoned")
            .push(component);
    }
}

impl Workspace for StaticWorkspace {
    fn components(&self) -> Vec<Arc<dyn Component>> {
        self.components
            .lock()
            .expect("workspace lock poisoned")
            .clone()
    }
}

/// A [`CouplingManager`] that counts propagation calls.
#[derive(Default)]
pub struct CountingCouplings {
    calls: AtomicUsize,
}

impl CountingCouplings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CouplingManager for CountingCouplings {
    fn update_all_couplings(&self) -> Result<(), CouplingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A [`CouplingManager`] that always fails.
pub struct FailingCouplings {
    reason: String,
}

impl FailingCouplings {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

impl CouplingManager for FailingCouplings {
    fn update_all_couplings(&self) -> Result<(), CouplingError> {
        Err(CouplingError::PropagationFailed {
            reason: self.reason.clone(),
        })
    }
}

// ── Listener recording ───────────────────────────────────────────

/// One recorded listener callback, captured by value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListenerEvent {
    Started {
        component: String,
        tick: TickId,
        slot: SlotId,
    },
    Finished {
        component: String,
        tick: TickId,
        slot: SlotId,
    },
    Couplings {
        tick: TickId,
    },
    ThreadCount {
        threads: usize,
    },
    Failed {
        component: Option<String>,
        tick: TickId,
        reason: String,
    },
}

/// An [`UpdateListener`] that records every callback in order.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything recorded so far, in delivery order.
    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().expect("event log lock poisoned").clone()
    }

    /// Poll until at least `n` events have been recorded.
    ///
    /// # Panics
    ///
    /// Panics after five seconds without reaching `n`.
    pub fn wait_for_events(&self, n: usize) -> Vec<ListenerEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let events = self.events();
            if events.len() >= n {
                return events;
            }
            assert!(
                Instant::now() < deadline,
                "timed out waiting for {n} events, have {}",
                events.len()
            );
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    fn record(&self, event: ListenerEvent) {
        self.events
            .lock()
            .expect("event log lock poisoned")
            .push(event);
    }
}

impl UpdateListener for RecordingListener {
    fn component_update_started(&self, component: &Arc<dyn Component>, tick: TickId, slot: SlotId) {
        self.record(ListenerEvent::Started {
            component: component.name().to_string(),
            tick,
            slot,
        });
    }

    fn component_update_finished(
        &self,
        component: &Arc<dyn Component>,
        tick: TickId,
        slot: SlotId,
    ) {
        self.record(ListenerEvent::Finished {
            component: component.name().to_string(),
            tick,
            slot,
        });
    }

    fn couplings_updated(&self, tick: TickId) {
        self.record(ListenerEvent::Couplings { tick });
    }

    fn thread_count_changed(&self, threads: usize) {
        self.record(ListenerEvent::ThreadCount { threads });
    }

    fn update_failed(&self, component: Option<&str>, tick: TickId, reason: &str) {
        self.record(ListenerEvent::Failed {
            component: component.map(str::to_string),
            tick,
            reason: reason.to_string(),
        });
    }
}
