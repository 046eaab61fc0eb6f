//! Store events reach a `log` logger such as the one the tripstore binary installs

use std::sync::Mutex;

use log::{Level, LevelFilter, Log, Metadata, Record};
use tempfile::TempDir;
use tripstore::TripStore;

struct Capture {
    lines: Mutex<Vec<(Level, String)>>,
}

impl Log for Capture {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.lines
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static CAPTURE: Capture = Capture {
    lines: Mutex::new(Vec::new()),
};

#[test]
fn test_store_events_reach_log_logger() {
    log::set_logger(&CAPTURE).expect("logger already set");
    log::set_max_level(LevelFilter::Trace);

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let _store = TripStore::open(temp_dir.path()).expect("Failed to open store");

    let lines = CAPTURE.lines.lock().unwrap();
    assert!(
        lines
            .iter()
            .any(|(level, line)| *level == Level::Info && line.contains("TripStore opened")),
        "captured: {:?}",
        *lines
    );
}
