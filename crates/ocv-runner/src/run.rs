//! Run options and the assembled results of a whole run

use chrono::{DateTime, Utc};
use ocv_context::TestContext;
use ocv_testbase::SuiteResult;
use serde::{Deserialize, Serialize};

/// Options governing how a run is orchestrated
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Dispatch no further suites after the first non-passing one.
    pub stop_on_error: bool,
    /// Refuse to run when any profile entry fails to load.
    pub strict: bool,
    /// Copy protocol requests and responses into the case logs.
    pub log_protocol: bool,
    /// Push initial configurations with Set Replace instead of Set Update.
    pub use_replace_for_configs: bool,
}

/// A profile entry that could not be turned into a suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadFailure {
    pub name: String,
    pub class_name: String,
    pub reason: String,
}

/// Results of a completed validation run
///
/// Pass and fail totals count suites, not cases. Entries that failed to
/// load never executed; they are carried separately and count against
/// `passed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    /// Address of the device the run spoke to.
    pub target: String,
    pub description: String,
    pub labels: Vec<String>,
    pub results: Vec<SuiteResult>,
    pub failed_to_load: Vec<LoadFailure>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub tests_pass: usize,
    pub tests_fail: usize,
    pub tests_total: usize,
}

impl TestRun {
    /// Assemble the report from a finished run.
    pub(crate) fn assemble(
        ctx: &TestContext,
        results: Vec<SuiteResult>,
        failed_to_load: Vec<LoadFailure>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let tests_total = results.len();
        let tests_pass = results.iter().filter(|r| r.succeeded()).count();
        Self {
            target: ctx
                .target
                .as_ref()
                .map(|t| t.target.clone())
                .unwrap_or_default(),
            description: ctx.description.clone(),
            labels: ctx.labels.clone(),
            results,
            failed_to_load,
            started_at,
            ended_at: Utc::now(),
            tests_pass,
            tests_fail: tests_total - tests_pass,
            tests_total,
        }
    }

    /// One-line verdict: `PASS x, FAIL y`.
    pub fn summary(&self) -> String {
        format!("PASS {}, FAIL {}", self.tests_pass, self.tests_fail)
    }

    /// Whole-run verdict: every suite passed and every entry loaded.
    pub fn passed(&self) -> bool {
        self.failed_to_load.is_empty() && self.results.iter().all(SuiteResult::succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocv_testbase::{CaseResult, Outcome};
    use serde_json::json;

    fn suite_result(name: &str, outcome: Outcome) -> SuiteResult {
        SuiteResult {
            name: name.to_string(),
            class_name: "get.Get".to_string(),
            cases: vec![CaseResult {
                case: "0200".to_string(),
                outcome,
                message: None,
                log: String::new(),
                started_at: Utc::now(),
                duration_ms: 1,
            }],
            started_at: Utc::now(),
            duration_ms: 1,
        }
    }

    #[test]
    fn test_totals_count_suites() {
        let results = vec![
            suite_result("a", Outcome::Pass),
            suite_result("b", Outcome::Fail),
            suite_result("c", Outcome::Pass),
        ];
        let run = TestRun::assemble(&TestContext::default(), results, Vec::new(), Utc::now());
        assert_eq!(run.tests_total, 3);
        assert_eq!(run.tests_pass, 2);
        assert_eq!(run.tests_fail, 1);
        assert_eq!(run.summary(), "PASS 2, FAIL 1");
        assert!(!run.passed());
    }

    #[test]
    fn test_load_failures_fail_the_run() {
        let failures = vec![LoadFailure {
            name: "typo".to_string(),
            class_name: "nope.Nope".to_string(),
            reason: "unknown test class 'nope.Nope'".to_string(),
        }];
        let results = vec![suite_result("a", Outcome::Pass)];
        let run = TestRun::assemble(&TestContext::default(), results, failures, Utc::now());
        assert_eq!(run.summary(), "PASS 1, FAIL 0");
        assert!(!run.passed());
    }

    #[test]
    fn test_context_fields_copied() {
        let ctx = TestContext {
            description: "nightly interface checks".to_string(),
            labels: vec!["smoke".to_string()],
            target: Some(serde_json::from_value(json!({"target": "device:9339"})).unwrap()),
            ..TestContext::default()
        };
        let run = TestRun::assemble(&ctx, Vec::new(), Vec::new(), Utc::now());
        assert_eq!(run.target, "device:9339");
        assert_eq!(run.description, "nightly interface checks");
        assert_eq!(run.labels, vec!["smoke"]);
        assert!(run.passed());
        assert_eq!(run.summary(), "PASS 0, FAIL 0");
    }

    #[test]
    fn test_skipped_cases_do_not_fail_a_suite() {
        let results = vec![suite_result("a", Outcome::Skipped)];
        let run = TestRun::assemble(&TestContext::default(), results, Vec::new(), Utc::now());
        assert_eq!(run.tests_pass, 1);
        assert!(run.passed());
    }
}
