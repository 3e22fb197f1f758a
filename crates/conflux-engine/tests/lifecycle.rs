//! End-to-end lifecycle tests for [`UpdateCoordinator`]: single-step
//! semantics, the continuous loop, stop latency, pool resizing, and
//! failure recovery, all observed through a recording listener.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use conflux_core::{ConfigError, CouplingManager, TaskSyncHook, TickId};
use conflux_engine::{EngineConfig, UpdateCoordinator};
use conflux_test_utils::{
    CountingCouplings, FailingPart, ListenerEvent, RecordingListener, StaticWorkspace,
    TestComponent,
};

const DEADLINE: Duration = Duration::from_secs(10);

fn engine(
    workspace: Arc<StaticWorkspace>,
    threads: usize,
) -> (UpdateCoordinator, Arc<CountingCouplings>) {
    let couplings = Arc::new(CountingCouplings::new());
    let coordinator = UpdateCoordinator::new(
        workspace,
        Arc::clone(&couplings) as Arc<dyn CouplingManager>,
        EngineConfig {
            threads: Some(threads),
            ..EngineConfig::default()
        },
    )
    .expect("engine construction");
    (coordinator, couplings)
}

fn wait_until(mut condition: impl FnMut() -> bool, what: &str) {
    let deadline = Instant::now() + DEADLINE;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn run_once_emits_couplings_then_component_bracket() {
    let a = TestComponent::new("a").with_parts(2);
    let workspace = Arc::new(StaticWorkspace::new(vec![a.share()]));
    let (engine, _) = engine(workspace, 2);
    let listener = Arc::new(RecordingListener::new());
    engine.add_listener(listener.clone());

    assert_eq!(engine.run_once().unwrap(), TickId(1));
    // couplings + started + finished
    let events = listener.wait_for_events(3);

    assert!(matches!(events[0], ListenerEvent::Couplings { tick: TickId(1) }));
    let started = events
        .iter()
        .position(|e| matches!(e, ListenerEvent::Started { .. }))
        .expect("started event");
    let finished = events
        .iter()
        .position(|e| matches!(e, ListenerEvent::Finished { .. }))
        .expect("finished event");
    assert!(started < finished);
    assert_eq!(events.len(), 3);
    assert_eq!(a.parts_run(), 2);
}

#[test]
fn loop_ticks_are_monotonic_and_stop_is_clean() {
    let workspace = Arc::new(StaticWorkspace::new(vec![
        TestComponent::new("c").with_parts(1).share(),
    ]));
    let (engine, couplings) = engine(workspace, 2);

    engine.run();
    wait_until(|| engine.time().0 >= 5, "five completed ticks");
    engine.stop();
    wait_until(|| !engine.is_running(), "stop flag");

    // The loop observes the flag between ticks; once run_once succeeds
    // the loop has fully exited.
    let deadline = Instant::now() + DEADLINE;
    let settled = loop {
        match engine.run_once() {
            Ok(t) => break t,
            Err(ConfigError::EngineRunning { .. }) => {
                assert!(Instant::now() < deadline, "loop never exited");
                std::thread::sleep(Duration::from_millis(2));
            }
            Err(other) => panic!("unexpected error {other}"),
        }
    };
    assert!(settled.0 >= 6);
    assert_eq!(engine.time(), settled);
    assert!(couplings.calls() as u64 >= settled.0);
}

#[test]
fn empty_workspace_loop_never_advances_or_notifies() {
    let workspace = Arc::new(StaticWorkspace::new(vec![]));
    let (engine, couplings) = engine(workspace, 2);
    let listener = Arc::new(RecordingListener::new());
    engine.add_listener(listener.clone());

    engine.run();
    std::thread::sleep(Duration::from_millis(50));
    engine.stop();

    assert_eq!(engine.time(), TickId(0));
    assert_eq!(couplings.calls(), 0);
    assert!(listener.events().is_empty());
}

#[test]
fn component_added_while_running_joins_later_ticks() {
    let workspace = Arc::new(StaticWorkspace::new(vec![
        TestComponent::new("first").with_parts(1).share(),
    ]));
    let (engine, _) = engine(Arc::clone(&workspace), 2);

    engine.run();
    wait_until(|| engine.time().0 >= 2, "warm-up ticks");

    let late = TestComponent::new("late").with_parts(1);
    workspace.push(late.share());
    wait_until(|| late.parts_run() >= 1, "late component to run");
    engine.stop();
}

#[test]
fn resize_while_stopped_notifies_and_runs_full_ticks() {
    let a = TestComponent::new("a").with_parts(4);
    let workspace = Arc::new(StaticWorkspace::new(vec![a.share()]));
    let (engine, _) = engine(workspace, 1);
    let listener = Arc::new(RecordingListener::new());
    engine.add_listener(listener.clone());

    engine.set_num_threads(4).unwrap();
    assert_eq!(engine.num_threads(), 4);

    assert_eq!(engine.run_once().unwrap(), TickId(1));
    assert_eq!(a.parts_run(), 4, "no part may be lost across a resize");

    // thread-count + couplings + started + finished
    let events = listener.wait_for_events(4);
    assert!(
        events.contains(&ListenerEvent::ThreadCount { threads: 4 }),
        "thread_count_changed must fire"
    );
}

#[test]
fn resize_while_running_is_rejected_and_loses_nothing() {
    let a = TestComponent::new("a").with_parts(2);
    let workspace = Arc::new(StaticWorkspace::new(vec![a.share()]));
    let (engine, _) = engine(workspace, 2);

    engine.run();
    assert_eq!(
        engine.set_num_threads(8),
        Err(ConfigError::EngineRunning {
            operation: "set_num_threads"
        })
    );
    assert_eq!(engine.num_threads(), 2);

    wait_until(|| engine.time().0 >= 3, "ticks despite rejected resize");
    engine.stop();
    drop(engine); // joins the driver; any in-flight tick is complete
    assert_eq!(a.parts_run() % 2, 0, "every completed tick ran both parts");
}

#[test]
fn failed_part_does_not_poison_subsequent_ticks() {
    let flaky = TestComponent::new("flaky")
        .with_parts(1)
        .with_part(FailingPart::new("sensor offline"));
    let steady = TestComponent::new("steady").with_parts(1);
    let workspace = Arc::new(StaticWorkspace::new(vec![flaky.share(), steady.share()]));
    let (engine, _) = engine(workspace, 2);
    let listener = Arc::new(RecordingListener::new());
    engine.add_listener(listener.clone());

    assert_eq!(engine.run_once().unwrap(), TickId(1));
    assert_eq!(engine.run_once().unwrap(), TickId(2));
    assert_eq!(steady.parts_run(), 2);

    // per tick: couplings + 2 x (started + finished) + 1 failure
    let events = listener.wait_for_events(12);
    let failures = events
        .iter()
        .filter(|e| matches!(e, ListenerEvent::Failed { .. }))
        .count();
    assert_eq!(failures, 2, "one failure report per tick");
}

#[test]
fn in_flight_tick_completes_after_stop() {
    let slow = TestComponent::new("slow").with_sleeping_part(Duration::from_millis(30));
    let workspace = Arc::new(StaticWorkspace::new(vec![slow.share()]));
    let (engine, couplings) = engine(workspace, 1);

    engine.run();
    wait_until(|| couplings.calls() >= 1, "first tick to begin");
    engine.stop();

    // stop() never aborts a tick: once couplings ran, the tick counter
    // must eventually reflect that tick.
    wait_until(|| engine.time().0 >= 1, "in-flight tick to complete");
}

/// Hook that records its bracket calls.
#[derive(Default)]
struct RecordingHook {
    log: Mutex<Vec<&'static str>>,
    run_calls: AtomicUsize,
}

impl RecordingHook {
    fn log(&self) -> Vec<&'static str> {
        self.log.lock().unwrap().clone()
    }
}

impl TaskSyncHook for RecordingHook {
    fn queue_tasks(&self) {
        self.log.lock().unwrap().push("queue");
    }

    fn release_tasks(&self) {
        self.log.lock().unwrap().push("release");
    }

    fn run_tasks(&self) {
        self.log.lock().unwrap().push("run");
        self.run_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn run_once_brackets_the_tick_with_the_hook() {
    let workspace = Arc::new(StaticWorkspace::new(vec![
        TestComponent::new("c").with_parts(1).share(),
    ]));
    let (engine, _) = engine(workspace, 1);
    let hook = Arc::new(RecordingHook::default());
    engine.set_sync_hook(Some(hook.clone()));

    engine.run_once().unwrap();
    assert_eq!(hook.log(), vec!["queue", "release", "run"]);
}

#[test]
fn loop_queues_once_runs_per_tick_and_releases_at_exit() {
    let workspace = Arc::new(StaticWorkspace::new(vec![
        TestComponent::new("c").with_parts(1).share(),
    ]));
    let (engine, _) = engine(workspace, 1);
    let hook = Arc::new(RecordingHook::default());
    engine.set_sync_hook(Some(hook.clone()));

    engine.run();
    wait_until(|| hook.run_calls.load(Ordering::SeqCst) >= 3, "per-tick run_tasks");
    engine.stop();
    wait_until(
        || {
            let log = hook.log();
            log.contains(&"release") && log.last() == Some(&"run")
        },
        "final run_tasks after release",
    );

    let log = hook.log();
    assert_eq!(log.first(), Some(&"queue"));
    assert_eq!(log.iter().filter(|s| **s == "queue").count(), 1);
    assert_eq!(log.iter().filter(|s| **s == "release").count(), 1);
    let release_at = log.iter().position(|s| *s == "release").unwrap();
    assert!(
        log[1..release_at].iter().all(|s| *s == "run"),
        "between queue and release only run_tasks may appear"
    );
    assert_eq!(log.last(), Some(&"run"), "one final drain after release");
}

#[test]
fn stale_loop_command_does_not_rebracket_hook() {
    let workspace = Arc::new(StaticWorkspace::new(vec![
        TestComponent::new("slow")
            .with_sleeping_part(Duration::from_millis(100))
            .share(),
    ]));
    let (engine, couplings) = engine(workspace, 1);
    let hook = Arc::new(RecordingHook::default());
    engine.set_sync_hook(Some(hook.clone()));

    engine.run();
    wait_until(|| couplings.calls() >= 1, "first tick to begin");
    // Flip the run flag off and on while the tick is still in flight.
    // The second loop command is stale by the time the driver dequeues
    // it and must not invoke the hook around zero ticks.
    engine.stop();
    engine.run();
    engine.stop();
    drop(engine); // joins the driver; every queued command is processed

    let log = hook.log();
    assert_eq!(log.iter().filter(|s| **s == "queue").count(), 1);
    assert_eq!(log.iter().filter(|s| **s == "release").count(), 1);
}

#[test]
fn removing_a_listener_silences_it() {
    let workspace = Arc::new(StaticWorkspace::new(vec![
        TestComponent::new("c").with_parts(1).share(),
    ]));
    let (engine, _) = engine(workspace, 1);
    let listener = Arc::new(RecordingListener::new());
    let id = engine.add_listener(listener.clone());

    engine.run_once().unwrap();
    let seen = listener.wait_for_events(3).len();

    assert!(engine.remove_listener(id));
    engine.run_once().unwrap();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(listener.events().len(), seen);
}
