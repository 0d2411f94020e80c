#![allow(unused_imports)]

//! Integration-style tests exercising the dispatcher end to end.

mod ordering;

use std::fmt;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use simple_logger::SimpleLogger;

use super::type_alias::*;
use super::*;

/// Call at the top of a test to see its log output while debugging.
#[allow(dead_code)]
fn init_logging() {
    let _ = SimpleLogger::new()
        .with_level(log::LevelFilter::Trace)
        .init();
}

/// Poll `cond` until it holds or `timeout` elapses.
fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

/// A selection update with all bounds set to `i`, for order tracking.
fn selection(i: i32) -> SelectionUpdate {
    SelectionUpdate {
        old_sel_start: i,
        old_sel_end: i,
        sel_start: i,
        sel_end: i,
        candidates_start: -1,
        candidates_end: -1,
    }
}

/// Target that records every invocation and tracks concurrent entry.
struct Recorder {
    log: Arc<Mutex<Vec<String>>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl Recorder {
    fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let rec = Self {
            log: log.clone(),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
            delay: None,
        };
        (rec, log)
    }

    /// A recorder that lingers inside each call, to widen any overlap
    /// window between concurrent invocations.
    fn with_delay(delay: Duration) -> (Self, Arc<Mutex<Vec<String>>>, Arc<AtomicUsize>) {
        let (mut rec, log) = Self::new();
        rec.delay = Some(delay);
        let max_active = rec.max_active.clone();
        (rec, log, max_active)
    }

    fn note(&self, entry: String) {
        let n = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(n, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        self.log.lock().unwrap().push(entry);
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CallTarget for Recorder {
    fn attach_token(&mut self, token: BindToken) {
        self.note(format!("attach_token:{}", token));
    }

    fn bind_input(&mut self, binding: InputBinding) {
        self.note(format!("bind_input:{}", binding.sequence));
    }

    fn unbind_input(&mut self) {
        self.note("unbind_input".to_owned());
    }

    fn start_input(&mut self, info: EditorInfo, restarting: bool) {
        self.note(format!("start_input:{}:{}", info.input_type, restarting));
    }

    fn show_soft_input(&mut self, flags: u32, result: Option<ResultSink>) {
        self.note(format!("show_soft_input:{}", flags));
        if let Some(result) = result {
            result.complete(true);
        }
    }

    fn hide_soft_input(&mut self, flags: u32, result: Option<ResultSink>) {
        self.note(format!("hide_soft_input:{}", flags));
        if let Some(result) = result {
            result.complete(true);
        }
    }

    fn update_selection(&mut self, update: SelectionUpdate) {
        self.note(format!("update_selection:{}", update.sel_start));
    }

    fn toggle_soft_input(&mut self, flags: u32) {
        self.note(format!("toggle_soft_input:{}", flags));
    }

    fn display_completions(&mut self, completions: Vec<Completion>) {
        self.note(format!("display_completions:{}", completions.len()));
    }

    fn change_subtype(&mut self, subtype: SubtypeId) {
        self.note(format!("change_subtype:{}", subtype));
    }

    fn revoke_session(&mut self) {
        self.note("revoke_session".to_owned());
    }

    fn dump(&mut self, w: &mut dyn fmt::Write, _args: &[String]) -> fmt::Result {
        writeln!(w, "  recorder: {} calls seen", self.log.lock().unwrap().len())
    }
}
