//! Test case trait, retry policy and the case/suite executors

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error};

use crate::context::{CaseContext, CaseEnv};
use crate::result::{CaseResult, Outcome, SuiteResult};

/// A non-passing case verdict
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaseFailure {
    /// A check failed. Retried when the case carries a retry policy.
    #[error("{0}")]
    Failed(String),

    /// The case could not run to a verdict. Never retried.
    #[error("{0}")]
    Errored(String),

    /// The case declined to run.
    #[error("{0}")]
    Skipped(String),
}

impl CaseFailure {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    pub fn errored(msg: impl Into<String>) -> Self {
        Self::Errored(msg.into())
    }

    pub fn skipped(msg: impl Into<String>) -> Self {
        Self::Skipped(msg.into())
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Failed(_) => Outcome::Fail,
            Self::Errored(_) => Outcome::Error,
            Self::Skipped(_) => Outcome::Skipped,
        }
    }
}

/// Verdict of one case execution
pub type CaseOutcome = Result<(), CaseFailure>;

/// Retry schedule for cases that re-check until the device converges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

/// Arguments every test class accepts alongside its own
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommonArgs {
    /// Stop the suite at the first non-passing case.
    #[serde(default)]
    pub failfast: bool,

    /// Total attempts for retry-capable cases.
    #[serde(default)]
    pub retries: Option<u32>,

    /// Seconds to pause between attempts.
    #[serde(default = "default_retry_delay_secs", alias = "retry_delay")]
    pub retry_delay_secs: u64,
}

fn default_retry_delay_secs() -> u64 {
    10
}

impl CommonArgs {
    pub fn from_args(
        args: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(args.clone()))
    }

    /// Retry schedule derived from `retries`/`retry_delay_secs`, if any.
    pub fn retry_policy(&self) -> Option<RetryPolicy> {
        self.retries.map(|attempts| RetryPolicy {
            attempts: attempts.max(1),
            delay: Duration::from_secs(self.retry_delay_secs),
        })
    }
}

/// Trait for a single executable check against the device
///
/// A case is constructed once per run with its arguments already bound and
/// validated, executed once (with internal retries), and discarded after its
/// result is collected.
#[async_trait]
pub trait TestCase: Send {
    /// Stable identifier; cases run in lexicographic id order.
    fn id(&self) -> &str;

    /// Retry schedule, for cases that re-check device state.
    fn retry(&self) -> Option<RetryPolicy> {
        None
    }

    async fn execute(&mut self, ctx: &mut CaseContext) -> CaseOutcome;
}

/// An ordered set of cases built from one profile entry
pub struct TestSuite {
    pub name: String,
    pub class_name: String,
    /// Stop at the first non-passing case, skipping the rest.
    pub failfast: bool,
    cases: Vec<Box<dyn TestCase>>,
}

impl std::fmt::Debug for TestSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestSuite")
            .field("name", &self.name)
            .field("class_name", &self.class_name)
            .field("failfast", &self.failfast)
            .field("cases", &self.case_ids())
            .finish()
    }
}

impl TestSuite {
    pub fn new(
        name: impl Into<String>,
        class_name: impl Into<String>,
        mut cases: Vec<Box<dyn TestCase>>,
        failfast: bool,
    ) -> Self {
        cases.sort_by(|a, b| a.id().cmp(b.id()));
        Self {
            name: name.into(),
            class_name: class_name.into(),
            failfast,
            cases,
        }
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn case_ids(&self) -> Vec<&str> {
        self.cases.iter().map(|c| c.id()).collect()
    }
}

/// Execute one case, honoring its retry policy.
///
/// Only failed checks are retried; errors and skips are final on the first
/// attempt. The result carries the last attempt's verdict and the log
/// accumulated across all attempts.
pub async fn run_case(case: &mut dyn TestCase, env: &CaseEnv) -> CaseResult {
    let started_at = Utc::now();
    let start = Instant::now();
    let mut ctx = env.case_context();
    debug!(case = case.id(), "starting case");

    let policy = case.retry();
    let attempts = policy.map(|p| p.attempts.max(1)).unwrap_or(1);
    let delay = policy.map(|p| p.delay).unwrap_or_default();

    let mut outcome = case.execute(&mut ctx).await;
    let mut attempt = 1;
    while attempt < attempts && matches!(outcome, Err(CaseFailure::Failed(_))) {
        tokio::time::sleep(delay).await;
        attempt += 1;
        ctx.log(format!("retrying, attempt {} of {}", attempt, attempts));
        outcome = case.execute(&mut ctx).await;
    }

    let (verdict, message) = match &outcome {
        Ok(()) => (Outcome::Pass, None),
        Err(failure) => (failure.outcome(), Some(failure.to_string())),
    };
    match verdict {
        Outcome::Pass | Outcome::Skipped => {
            debug!(case = case.id(), outcome = %verdict, "case finished")
        }
        Outcome::Fail | Outcome::Error => {
            error!(case = case.id(), outcome = %verdict, "case finished")
        }
    }

    CaseResult {
        case: case.id().to_string(),
        outcome: verdict,
        message,
        log: ctx.log_text(),
        started_at,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// Execute a suite's cases in order.
///
/// With fail-fast set, the first non-passing case marks the remaining cases
/// as skipped without executing them; the case that failed still reports its
/// own verdict.
pub async fn run_suite(suite: &mut TestSuite, env: &CaseEnv) -> SuiteResult {
    let started_at = Utc::now();
    let start = Instant::now();
    debug!(suite = %suite.name, cases = suite.cases.len(), "starting suite");

    let mut results = Vec::with_capacity(suite.cases.len());
    let mut stopped = false;
    for case in &mut suite.cases {
        if stopped {
            results.push(CaseResult::skipped(case.id(), "earlier case failed"));
            continue;
        }
        let result = run_case(case.as_mut(), env).await;
        if suite.failfast && matches!(result.outcome, Outcome::Fail | Outcome::Error) {
            stopped = true;
        }
        results.push(result);
    }

    SuiteResult {
        name: suite.name.clone(),
        class_name: suite.class_name.clone(),
        cases: results,
        started_at,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}
