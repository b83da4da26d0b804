//! Records `log` output so unit tests can assert on it

use std::sync::{Mutex, Once};

use log::{Level, LevelFilter, Log, Metadata, Record};

struct Capture;

static RECORDS: Mutex<Vec<(Level, String)>> = Mutex::new(Vec::new());
static INIT: Once = Once::new();
static LOGGER: Capture = Capture;

impl Log for Capture {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(mut records) = RECORDS.lock() {
            records.push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

/// Install the capturing logger (once per test binary)
pub fn init() {
    INIT.call_once(|| {
        log::set_logger(&LOGGER).expect("logger already set");
        log::set_max_level(LevelFilter::Trace);
    });
}

/// Levels of every record logged so far whose message contains `needle`
pub fn levels_mentioning(needle: &str) -> Vec<Level> {
    RECORDS
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, msg)| msg.contains(needle))
        .map(|(level, _)| *level)
        .collect()
}
