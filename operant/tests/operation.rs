use operant::{AsyncOperation, Completion, Key, Observer, Operation, Phase, Work};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const UNIT: Duration = Duration::from_millis(100);

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Work that keeps its completion until the test fires it.
#[derive(Default)]
struct Manual {
    runs: AtomicUsize,
    completion: Mutex<Option<Completion>>,
}

impl Manual {
    fn complete(&self) {
        let completion = self.completion.lock().unwrap().take();
        completion.expect("work was not run").complete();
    }
}

impl Work for Manual {
    fn run(&self, completion: Completion) {
        self.runs.fetch_add(1, Ordering::SeqCst);
        *self.completion.lock().unwrap() = Some(completion);
    }
}

/// Work completing from another thread after `delay`.
fn delayed(delay: Duration) -> AsyncOperation<impl Work> {
    AsyncOperation::new(move |completion: Completion| {
        thread::spawn(move || {
            thread::sleep(delay);
            completion.complete();
        });
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Will(Key),
    Did(Key, bool),
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl Observer for Recorder {
    fn will_change(&self, key: Key) {
        self.events.lock().unwrap().push(Event::Will(key));
    }

    fn did_change(&self, key: Key, value: bool) {
        self.events.lock().unwrap().push(Event::Did(key, value));
    }
}

#[test]
fn test_initial_state() {
    let operation = AsyncOperation::new(Manual::default());

    assert!(!operation.is_executing());
    assert!(!operation.is_finished());
    assert!(!operation.is_cancelled());
    assert!(operation.is_asynchronous());
    assert_eq!(operation.phase(), Phase::NotStarted);
}

#[test]
fn test_cancel_before_start_skips_work() {
    init_logging();
    let operation = AsyncOperation::new(Manual::default());

    operation.cancel();
    operation.start();

    assert!(!operation.is_executing());
    assert!(operation.is_finished());
    assert!(operation.is_cancelled());
    assert_eq!(operation.work().runs.load(Ordering::SeqCst), 0);
}

#[test]
fn test_cancel_before_start_never_sets_executing() {
    let operation = AsyncOperation::new(Manual::default());
    let recorder = Arc::new(Recorder::default());
    operation.add_observer(recorder.clone());

    operation.cancel();
    operation.start();

    assert!(
        !recorder
            .events()
            .contains(&Event::Did(Key::IsExecuting, true)),
        "a cancelled operation must not become executing"
    );
}

#[test]
fn test_normal_completion() {
    init_logging();
    let operation = AsyncOperation::new(Manual::default());

    operation.start();

    assert!(operation.is_executing());
    assert!(!operation.is_finished());
    assert_eq!(operation.phase(), Phase::Executing);
    assert_eq!(operation.work().runs.load(Ordering::SeqCst), 1);

    operation.work().complete();

    assert!(!operation.is_executing());
    assert!(operation.is_finished());
    assert_eq!(operation.phase(), Phase::Finished);
}

#[test]
fn test_cancel_after_start_does_not_interrupt() {
    let operation = AsyncOperation::new(Manual::default());

    operation.start();
    operation.cancel();

    assert!(operation.is_cancelled());
    assert!(operation.is_executing(), "cancellation is only honored at start");

    operation.work().complete();
    assert!(operation.is_finished());
}

#[test]
fn test_finished_is_monotonic() {
    let operation = AsyncOperation::new(Manual::default());

    operation.start();
    operation.work().complete();
    assert!(operation.is_finished());

    operation.start();
    operation.cancel();
    operation.start();

    assert!(operation.is_finished());
    assert!(!operation.is_executing());
    assert_eq!(
        operation.work().runs.load(Ordering::SeqCst),
        1,
        "restarting must not run the work again"
    );
}

#[test]
fn test_start_twice_runs_work_once() {
    let operation = AsyncOperation::new(Manual::default());

    operation.start();
    operation.start();

    assert!(operation.is_executing());
    assert_eq!(operation.work().runs.load(Ordering::SeqCst), 1);

    operation.work().complete();
    assert!(operation.is_finished());
}

#[test]
fn test_notifications_are_paired_and_ordered() {
    let operation = AsyncOperation::new(Manual::default());
    let recorder = Arc::new(Recorder::default());
    operation.add_observer(recorder.clone());

    operation.start();
    assert_eq!(
        recorder.events(),
        vec![
            Event::Will(Key::IsFinished),
            Event::Did(Key::IsFinished, false),
            Event::Will(Key::IsExecuting),
            Event::Did(Key::IsExecuting, true),
        ]
    );

    operation.work().complete();
    assert_eq!(
        recorder.events()[4..],
        [
            Event::Will(Key::IsExecuting),
            Event::Did(Key::IsExecuting, false),
            Event::Will(Key::IsFinished),
            Event::Did(Key::IsFinished, true),
        ]
    );
}

#[test]
fn test_cancelled_start_notifications() {
    let operation = AsyncOperation::new(Manual::default());
    let recorder = Arc::new(Recorder::default());
    operation.add_observer(recorder.clone());

    operation.cancel();
    operation.start();

    assert_eq!(
        recorder.events(),
        vec![
            Event::Will(Key::IsExecuting),
            Event::Did(Key::IsExecuting, false),
            Event::Will(Key::IsFinished),
            Event::Did(Key::IsFinished, true),
        ]
    );
}

#[test]
fn test_every_observer_is_notified() {
    let operation = AsyncOperation::new(Manual::default());
    let first = Arc::new(Recorder::default());
    let second = Arc::new(Recorder::default());
    operation.add_observer(first.clone());
    operation.add_observer(second.clone());

    operation.start();
    operation.work().complete();

    assert_eq!(first.events().len(), 8);
    assert_eq!(first.events(), second.events());
}

#[test]
fn test_completion_block_runs_once_after_finish() {
    let operation = Arc::new(AsyncOperation::new(Manual::default()));
    let calls = Arc::new(AtomicUsize::new(0));
    let saw_finished = Arc::new(AtomicBool::new(false));

    {
        let calls = calls.clone();
        let saw_finished = saw_finished.clone();
        let observed = operation.clone();
        operation.set_completion_block(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            saw_finished.store(observed.is_finished(), Ordering::SeqCst);
        });
    }

    operation.start();
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    operation.work().complete();
    operation.start();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(saw_finished.load(Ordering::SeqCst));
}

#[test]
fn test_completion_block_runs_on_cancel() {
    let operation = AsyncOperation::new(Manual::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    operation.set_completion_block(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    operation.cancel();
    operation.start();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_dropped_completion_leaves_operation_executing() {
    init_logging();
    let operation = AsyncOperation::new(|completion: Completion| drop(completion));

    operation.start();

    assert!(operation.is_executing());
    assert!(!operation.is_finished());
}

#[test]
fn test_named_operation() {
    let operation = AsyncOperation::named("fetch", Manual::default());

    assert_eq!(operation.name(), Some("fetch"));
    assert_eq!(AsyncOperation::new(Manual::default()).name(), None);
}

#[test]
fn test_completion_from_another_thread() {
    let operation = delayed(UNIT);
    let started = Instant::now();

    operation.start();
    assert!(operation.is_executing(), "start must not wait for the work");

    let deadline = started + Duration::from_secs(5);
    while !operation.is_finished() {
        assert!(Instant::now() < deadline, "operation never finished");
        thread::sleep(Duration::from_millis(5));
    }

    assert!(
        started.elapsed() >= UNIT,
        "finished after {:?}, before the work completed",
        started.elapsed()
    );
    assert!(!operation.is_executing());
}

#[test]
fn test_concurrent_readers_never_see_both_flags() {
    for _ in 0..50 {
        let operation = AsyncOperation::new(Manual::default());

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let mut last = Phase::NotStarted;

                    loop {
                        let finished = operation.is_finished();
                        let executing = operation.is_executing();
                        if finished {
                            assert!(!executing, "executing after finished");
                        }

                        let phase = operation.phase();
                        match (last, phase) {
                            (Phase::Executing, Phase::NotStarted)
                            | (Phase::Finished, Phase::NotStarted)
                            | (Phase::Finished, Phase::Executing) => {
                                panic!("phase went back from {last:?} to {phase:?}")
                            }
                            _ => {}
                        }
                        last = phase;

                        if phase == Phase::Finished {
                            break;
                        }
                    }
                });
            }

            operation.start();
            operation.work().complete();
        });

        assert!(operation.is_finished());
    }
}
