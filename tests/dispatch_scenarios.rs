//! End-to-end dispatch scenarios with a scripted input source and a recording
//! injector. No hardware or ydotool needed.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use m720_remapper::action::{BTN_BACK, BTN_EXTRA, BTN_FORWARD, BTN_LEFT, BTN_MIDDLE, BTN_SIDE};
use m720_remapper::device::{find_device, DeviceInfo, DeviceMatcher, InputSource, Readiness};
use m720_remapper::{
    Action, ActionMap, DispatchStats, Dispatcher, Event, EventKind, InjectionError, KeyInjector,
    LoopState, RemapError, RemapperConfig,
};

/// One step of a scripted source
enum Step {
    Batch(Vec<Event>),
    Idle,
    Fail(io::ErrorKind),
}

/// Plays back steps, then clears the running flag
struct ScriptedSource {
    steps: VecDeque<Step>,
    pending: Option<Step>,
    running: Arc<AtomicBool>,
}

impl ScriptedSource {
    fn new(steps: Vec<Step>, running: Arc<AtomicBool>) -> Self {
        Self {
            steps: steps.into(),
            pending: None,
            running,
        }
    }
}

impl InputSource for ScriptedSource {
    fn name(&self) -> &str {
        "Scripted M720"
    }

    fn wait(&mut self, _timeout: Duration) -> io::Result<Readiness> {
        match self.steps.pop_front() {
            Some(Step::Idle) => Ok(Readiness::TimedOut),
            Some(step) => {
                self.pending = Some(step);
                Ok(Readiness::Ready)
            }
            None => {
                self.running.store(false, Ordering::SeqCst);
                Ok(Readiness::TimedOut)
            }
        }
    }

    fn drain(&mut self) -> io::Result<Vec<Event>> {
        match self.pending.take() {
            Some(Step::Batch(events)) => Ok(events),
            Some(Step::Fail(kind)) => Err(io::Error::from(kind)),
            Some(Step::Idle) | None => Ok(Vec::new()),
        }
    }
}

/// Shared view of what the injector saw
#[derive(Default)]
struct Journal {
    entries: RefCell<Vec<String>>,
    in_flight: Cell<bool>,
    overlaps: Cell<usize>,
}

struct RecordingInjector {
    journal: Rc<Journal>,
    fail_with_unavailable: bool,
}

impl RecordingInjector {
    fn new(journal: Rc<Journal>) -> Self {
        Self {
            journal,
            fail_with_unavailable: false,
        }
    }

    fn unavailable(journal: Rc<Journal>) -> Self {
        Self {
            journal,
            fail_with_unavailable: true,
        }
    }
}

impl KeyInjector for RecordingInjector {
    fn inject(&mut self, action: Action) -> Result<(), InjectionError> {
        if self.journal.in_flight.replace(true) {
            self.journal.overlaps.set(self.journal.overlaps.get() + 1);
        }
        self.journal
            .entries
            .borrow_mut()
            .push(format!("start {action}"));

        let result = if self.fail_with_unavailable {
            Err(InjectionError::ToolUnavailable {
                tool: "ydotool".to_string(),
            })
        } else {
            Ok(())
        };

        self.journal.entries.borrow_mut().push(format!("end {action}"));
        self.journal.in_flight.set(false);
        result
    }
}

type RunResult = (
    Result<DispatchStats, RemapError>,
    Dispatcher<RecordingInjector>,
);

fn run_script(steps: Vec<Step>, injector: RecordingInjector) -> RunResult {
    let running = Arc::new(AtomicBool::new(true));
    let source = ScriptedSource::new(steps, Arc::clone(&running));
    let mut dispatcher = Dispatcher::new(ActionMap::default(), injector);
    let result = dispatcher.run(source, &running);
    (result, dispatcher)
}

fn starts(journal: &Journal) -> Vec<String> {
    journal
        .entries
        .borrow()
        .iter()
        .filter(|e| e.starts_with("start"))
        .cloned()
        .collect()
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

fn with_captured_logs<T>(level: tracing::Level, f: impl FnOnce() -> T) -> (T, String) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, logs.text())
}

#[test]
fn side_press_and_release_injects_once() {
    let journal = Rc::new(Journal::default());
    let (result, _) = run_script(
        vec![Step::Batch(vec![Event::press(BTN_SIDE), Event::release(BTN_SIDE)])],
        RecordingInjector::new(Rc::clone(&journal)),
    );

    let stats = result.unwrap();
    assert_eq!(starts(&journal), vec!["start desktop-right"]);
    assert_eq!(stats.presses, 1);
    assert_eq!(stats.injections, 1);
}

#[test]
fn aliases_trigger_the_same_action() {
    let journal = Rc::new(Journal::default());
    let (result, _) = run_script(
        vec![
            Step::Batch(vec![Event::press(BTN_SIDE), Event::release(BTN_SIDE)]),
            Step::Batch(vec![Event::press(BTN_BACK), Event::release(BTN_BACK)]),
            Step::Batch(vec![Event::press(BTN_EXTRA), Event::release(BTN_EXTRA)]),
            Step::Batch(vec![Event::press(BTN_FORWARD), Event::release(BTN_FORWARD)]),
        ],
        RecordingInjector::new(Rc::clone(&journal)),
    );

    result.unwrap();
    assert_eq!(
        starts(&journal),
        vec![
            "start desktop-right",
            "start desktop-right",
            "start desktop-left",
            "start desktop-left",
        ]
    );
}

#[test]
fn injection_count_equals_mapped_presses() {
    let events = vec![
        Event::press(BTN_LEFT),
        Event::release(BTN_LEFT),
        Event::new(EventKind::Relative, 0, 5),
        Event::new(EventKind::Sync, 0, 0),
        Event::press(BTN_SIDE),
        Event::repeat(BTN_SIDE),
        Event::release(BTN_SIDE),
        Event::press(BTN_MIDDLE),
        Event::press(BTN_FORWARD),
        Event::release(BTN_FORWARD),
        Event::release(BTN_EXTRA),
    ];
    let map = ActionMap::default();
    let expected = events
        .iter()
        .filter(|e| e.kind == EventKind::Key && e.value == 1 && map.map_code(e.code).is_mapped())
        .count();

    let journal = Rc::new(Journal::default());
    let (result, _) = run_script(
        vec![Step::Batch(events)],
        RecordingInjector::new(Rc::clone(&journal)),
    );

    let stats = result.unwrap();
    assert_eq!(expected, 2);
    assert_eq!(starts(&journal).len(), expected);
    assert_eq!(stats.injections as usize, expected);
    assert_eq!(stats.unmapped, 2);
}

#[test]
fn injections_within_a_batch_never_overlap() {
    let journal = Rc::new(Journal::default());
    let (result, _) = run_script(
        vec![Step::Batch(vec![
            Event::press(BTN_SIDE),
            Event::press(BTN_EXTRA),
            Event::press(BTN_BACK),
        ])],
        RecordingInjector::new(Rc::clone(&journal)),
    );

    result.unwrap();
    assert_eq!(journal.overlaps.get(), 0);
    assert_eq!(
        *journal.entries.borrow(),
        vec![
            "start desktop-right",
            "end desktop-right",
            "start desktop-left",
            "end desktop-left",
            "start desktop-right",
            "end desktop-right",
        ]
    );
}

#[test]
fn unmapped_press_is_logged_not_injected() {
    let journal = Rc::new(Journal::default());
    // Visible at the default log level
    let ((result, _), logs) = with_captured_logs(tracing::Level::INFO, || {
        run_script(
            vec![Step::Batch(vec![Event::press(BTN_MIDDLE)])],
            RecordingInjector::new(Rc::clone(&journal)),
        )
    });

    assert_eq!(result.unwrap().unmapped, 1);
    assert!(journal.entries.borrow().is_empty());
    assert_eq!(logs.matches("Unmapped button pressed").count(), 1);
    assert!(logs.contains("BTN_MIDDLE"));
}

#[test]
fn missing_tool_is_logged_and_loop_continues() {
    let journal = Rc::new(Journal::default());
    let ((result, dispatcher), logs) = with_captured_logs(tracing::Level::INFO, || {
        run_script(
            vec![
                Step::Batch(vec![Event::press(BTN_SIDE)]),
                Step::Idle,
                Step::Batch(vec![Event::press(BTN_EXTRA)]),
            ],
            RecordingInjector::unavailable(Rc::clone(&journal)),
        )
    });

    let stats = result.unwrap();
    assert_eq!(stats.failures, 2);
    assert_eq!(stats.batches, 2);
    assert_eq!(starts(&journal).len(), 2);
    assert!(logs.contains("ydotool not found"));
    assert_eq!(dispatcher.state(), LoopState::Stopped);
}

#[test]
fn would_block_ends_batch_without_error() {
    let journal = Rc::new(Journal::default());
    let (result, _) = run_script(
        vec![
            Step::Fail(io::ErrorKind::WouldBlock),
            Step::Batch(vec![Event::press(BTN_BACK)]),
        ],
        RecordingInjector::new(Rc::clone(&journal)),
    );

    assert_eq!(result.unwrap().injections, 1);
}

#[test]
fn device_loss_stops_the_loop() {
    let journal = Rc::new(Journal::default());
    let (result, _) = run_script(
        vec![
            Step::Batch(vec![Event::press(BTN_SIDE)]),
            Step::Fail(io::ErrorKind::NotConnected),
            Step::Batch(vec![Event::press(BTN_EXTRA)]),
        ],
        RecordingInjector::new(Rc::clone(&journal)),
    );

    assert!(matches!(result, Err(RemapError::Read(_))));
    assert_eq!(starts(&journal), vec!["start desktop-right"]);
}

#[test]
fn no_matching_device_reports_every_candidate() {
    let candidates = vec![
        DeviceInfo::new("/dev/input/event0", "Power Button", vec![116]),
        DeviceInfo::new("/dev/input/event3", "AT Translated Set 2 keyboard", vec![30, 31]),
        DeviceInfo::new("/dev/input/event5", "SynPS/2 Synaptics TouchPad", vec![BTN_LEFT]),
    ];
    let matcher = DeviceMatcher::from_config(&RemapperConfig::default().device);

    match find_device(candidates.clone(), &matcher) {
        Err(RemapError::DeviceNotFound { available }) => assert_eq!(available, candidates),
        other => panic!("expected DeviceNotFound, got {other:?}"),
    }
}
