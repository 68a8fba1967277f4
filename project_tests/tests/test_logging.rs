use lib_indicators::loggers::{setup_logging, LogSettings};
use std::fs;
use tempfile::tempdir;

/// Installs the global subscriber with a JSON file layer, logs a few
/// structured events and checks they reach the daily log file once the
/// writer guard is dropped.
///
/// The subscriber is process-global, so this binary holds a single test.
#[test]
fn structured_events_reach_the_json_log_file() {
    let temp_dir = tempdir().expect("Failed to create temporary directory");

    let settings = LogSettings {
        level: "info".to_string(),
        log_dir: Some(temp_dir.path().join("nested")),
        file_prefix: "indicators-test".to_string(),
        console: false,
    };
    let guard = setup_logging(&settings)
        .expect("Failed to install subscriber")
        .expect("File logging should return a guard");

    tracing::info!(key = "current", items = 8, "Refresh applied");
    tracing::warn!(key = "historical:riesgo_pais", kind = "timeout", "Refresh failed, keeping last good data");

    // A second install must fail instead of silently replacing the first.
    assert!(setup_logging(&LogSettings { log_dir: None, ..settings.clone() }).is_err());

    // Flushes the non-blocking writer.
    drop(guard);

    let log_files: Vec<_> = fs::read_dir(temp_dir.path().join("nested"))
        .expect("Failed to read log directory")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    assert_eq!(log_files.len(), 1, "Expected one daily log file, found {log_files:?}");

    let file_name = log_files[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(file_name.starts_with("indicators-test"), "Unexpected file name {file_name}");

    let contents = fs::read_to_string(&log_files[0]).expect("Failed to read log file");
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).expect("Every line should be JSON"))
        .collect();

    let applied = lines
        .iter()
        .find(|l| l["fields"]["message"] == "Refresh applied")
        .expect("Info event not found");
    assert_eq!(applied["level"], "INFO");
    assert_eq!(applied["fields"]["items"], 8);

    let failed = lines
        .iter()
        .find(|l| l["fields"]["kind"] == "timeout")
        .expect("Warn event not found");
    assert_eq!(failed["level"], "WARN");
    assert_eq!(failed["fields"]["key"], "historical:riesgo_pais");
}
