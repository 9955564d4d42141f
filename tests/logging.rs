//! Log output of a failed run, captured through the `log` facade.

use flatfile_etl::{JobConfig, run_job};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs;
use std::sync::Mutex;
use tempfile::TempDir;

struct CapturingLogger {
    lines: Mutex<Vec<(Level, String)>>,
}

impl Log for CapturingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static LOGGER: CapturingLogger = CapturingLogger {
    lines: Mutex::new(Vec::new()),
};

#[test]
fn test_failed_run_leaves_error_line_to_callback() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Debug);

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.csv");
    fs::write(&input, "Smith,John\nbroken\n").unwrap();
    let config = JobConfig {
        input_path: input,
        output_path: dir.path().join("out.xml"),
        ..JobConfig::default()
    };
    let report = run_job(&config, |report| log::error!("Job failed: {}", report.status));
    assert!(!report.status.is_completed());

    let lines = LOGGER.lines.lock().unwrap();
    let errors: Vec<&String> = lines
        .iter()
        .filter(|(level, _)| *level == Level::Error)
        .map(|(_, text)| text)
        .collect();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].starts_with("Job failed: Failed(ParseError"));
    assert!(
        lines
            .iter()
            .any(|(level, text)| *level == Level::Debug && text.starts_with("Job failed after 1 chunks"))
    );
}
