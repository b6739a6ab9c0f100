//! Captures log records emitted on the current test thread.

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::cell::RefCell;
use std::sync::Once;

thread_local! {
    // `None` until `capture` is called on the thread.
    static RECORDS: RefCell<Option<Vec<(Level, String)>>> = RefCell::new(None);
}

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        // Thread-locals may already be gone while a thread shuts down.
        let _ = RECORDS.try_with(|records| {
            if let Some(records) = records.borrow_mut().as_mut() {
                records.push((record.level(), record.args().to_string()));
            }
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

/// Start capturing on this thread, discarding anything recorded so far.
pub fn capture() {
    INIT.call_once(|| {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(LevelFilter::Trace);
    });
    RECORDS.with(|records| *records.borrow_mut() = Some(Vec::new()));
}

/// Error-level messages logged on this thread since [`capture`].
pub fn errors() -> Vec<String> {
    RECORDS.with(|records| {
        records
            .borrow()
            .iter()
            .flatten()
            .filter(|(level, _)| *level == Level::Error)
            .map(|(_, message)| message.clone())
            .collect()
    })
}
