//! Report formatters: write a completed run to a file
//!
//! JSON is the only supported format. `formatter_for` resolves a format
//! name case-insensitively so callers can pass it straight from a flag.

use ocv_runner::TestRun;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Error producing a report file
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("'{0}' is not a supported report format")]
    Unsupported(String),

    #[error("cannot write report to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Renders a completed run into a file.
pub trait Formatter: std::fmt::Debug {
    fn write_to_file(&self, run: &TestRun, path: &Path) -> Result<(), ReportError>;
}

/// Pretty-printed JSON report
#[derive(Debug)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn write_to_file(&self, run: &TestRun, path: &Path) -> Result<(), ReportError> {
        let text = serde_json::to_string_pretty(run)?;
        std::fs::write(path, text).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("results written to {}", path.display());
        Ok(())
    }
}

/// Look up a formatter by format name, case-insensitively.
pub fn formatter_for(name: &str) -> Result<Box<dyn Formatter>, ReportError> {
    match name.to_ascii_lowercase().as_str() {
        "json" => Ok(Box::new(JsonFormatter)),
        _ => Err(ReportError::Unsupported(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ocv_runner::LoadFailure;
    use ocv_testbase::{CaseResult, Outcome, SuiteResult};

    fn sample_run() -> TestRun {
        TestRun {
            target: "device:9339".to_string(),
            description: "nightly".to_string(),
            labels: vec!["smoke".to_string()],
            results: vec![SuiteResult {
                name: "hostname".to_string(),
                class_name: "get.GetCompare".to_string(),
                cases: vec![CaseResult {
                    case: "0200".to_string(),
                    outcome: Outcome::Pass,
                    message: None,
                    log: "Get(/system/state/hostname) <= \"switch1\"".to_string(),
                    started_at: Utc::now(),
                    duration_ms: 12,
                }],
                started_at: Utc::now(),
                duration_ms: 12,
            }],
            failed_to_load: vec![LoadFailure {
                name: "typo".to_string(),
                class_name: "get.Gte".to_string(),
                reason: "unknown test class 'get.Gte'".to_string(),
            }],
            started_at: Utc::now(),
            ended_at: Utc::now(),
            tests_pass: 1,
            tests_fail: 0,
            tests_total: 1,
        }
    }

    #[test]
    fn test_json_report_round_trip() {
        let run = sample_run();
        let file = tempfile::NamedTempFile::new().unwrap();
        JsonFormatter.write_to_file(&run, file.path()).unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        let decoded: TestRun = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded.target, "device:9339");
        assert_eq!(decoded.tests_pass, 1);
        assert_eq!(decoded.results[0].cases[0].outcome, Outcome::Pass);
        assert_eq!(decoded.failed_to_load[0].name, "typo");
    }

    #[test]
    fn test_report_is_pretty_printed() {
        let run = sample_run();
        let file = tempfile::NamedTempFile::new().unwrap();
        JsonFormatter.write_to_file(&run, file.path()).unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.contains("\n  \"target\": \"device:9339\""));
    }

    #[test]
    fn test_formatter_name_is_case_insensitive() {
        assert!(formatter_for("json").is_ok());
        assert!(formatter_for("JSON").is_ok());
    }

    #[test]
    fn test_unsupported_format() {
        let err = formatter_for("xml").unwrap_err();
        assert_eq!(err.to_string(), "'xml' is not a supported report format");
    }

    #[test]
    fn test_write_failure_reported() {
        let run = sample_run();
        let err = JsonFormatter
            .write_to_file(&run, Path::new("/nonexistent/report.json"))
            .unwrap_err();
        assert!(matches!(err, ReportError::Io { .. }));
    }

    #[test]
    fn test_lookup_writes_through_trait_object() {
        let run = sample_run();
        let file = tempfile::NamedTempFile::new().unwrap();
        let formatter = formatter_for("json").unwrap();
        formatter.write_to_file(&run, file.path()).unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.contains("tests_pass"));
    }
}
