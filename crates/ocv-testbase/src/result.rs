//! Result types for executed cases and suites

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final outcome of one executed case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Pass,
    Fail,
    Error,
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => write!(f, "PASS"),
            Outcome::Fail => write!(f, "FAIL"),
            Outcome::Error => write!(f, "ERROR"),
            Outcome::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Result of one executed case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    /// Case identifier within its suite.
    pub case: String,
    pub outcome: Outcome,
    /// Failure or skip reason, absent on a pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Operation log accumulated while the case ran.
    pub log: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl CaseResult {
    /// Result for a case that was never executed.
    pub fn skipped(case: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            case: case.into(),
            outcome: Outcome::Skipped,
            message: Some(reason.into()),
            log: String::new(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }
}

/// Results of one executed suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    /// Display name from the profile entry.
    pub name: String,
    /// Test class the suite was built from.
    pub class_name: String,
    pub cases: Vec<CaseResult>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl SuiteResult {
    /// A suite succeeds when no case failed or errored; skips are fine.
    pub fn succeeded(&self) -> bool {
        !self
            .cases
            .iter()
            .any(|c| matches!(c.outcome, Outcome::Fail | Outcome::Error))
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.cases.iter().filter(|c| c.outcome == outcome).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(outcome: Outcome) -> CaseResult {
        CaseResult {
            case: "0100".to_string(),
            outcome,
            message: None,
            log: String::new(),
            started_at: Utc::now(),
            duration_ms: 1,
        }
    }

    fn suite(outcomes: &[Outcome]) -> SuiteResult {
        SuiteResult {
            name: "suite".to_string(),
            class_name: "get.Get".to_string(),
            cases: outcomes.iter().copied().map(case).collect(),
            started_at: Utc::now(),
            duration_ms: 1,
        }
    }

    #[test]
    fn test_suite_success() {
        assert!(suite(&[Outcome::Pass, Outcome::Skipped]).succeeded());
        assert!(!suite(&[Outcome::Pass, Outcome::Fail]).succeeded());
        assert!(!suite(&[Outcome::Error]).succeeded());
    }

    #[test]
    fn test_outcome_counts() {
        let s = suite(&[Outcome::Pass, Outcome::Pass, Outcome::Fail, Outcome::Skipped]);
        assert_eq!(s.count(Outcome::Pass), 2);
        assert_eq!(s.count(Outcome::Fail), 1);
        assert_eq!(s.count(Outcome::Error), 0);
        assert_eq!(s.count(Outcome::Skipped), 1);
    }

    #[test]
    fn test_outcome_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Outcome::Pass).unwrap(), "\"PASS\"");
        assert_eq!(
            serde_json::to_string(&Outcome::Skipped).unwrap(),
            "\"SKIPPED\""
        );
    }
}
