//! Suite orchestration: one worker task per suite, serialized on the
//! shared connection lock

use chrono::Utc;
use ocv_context::{TestContext, TestEntry};
use ocv_schema::SchemaBinding;
use ocv_session::DeviceSession;
use ocv_testbase::{run_suite, CaseEnv, CaseResult, Outcome, SuiteResult, TestSuite};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::init::{apply_init_configs, InitConfigError};
use crate::run::{LoadFailure, RunOptions, TestRun};
use crate::state::{InvalidTransition, RunState};

/// Error that prevents a run from executing
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Strict mode and at least one profile entry does not load.
    #[error("{failed} of {total} tests failed to load")]
    FailedToLoad { failed: usize, total: usize },

    /// The runner was dispatched from a state that does not allow it.
    #[error(transparent)]
    State(#[from] InvalidTransition),
}

/// Build one suite per profile entry.
///
/// Entries that do not load (unknown class, bad arguments) are dropped and
/// reported; whether they abort the run is the caller's policy.
pub fn build_suites(entries: &[TestEntry]) -> (Vec<TestSuite>, Vec<LoadFailure>) {
    let mut suites = Vec::with_capacity(entries.len());
    let mut failures = Vec::new();
    for entry in entries {
        match ocv_testcases::build_suite(entry) {
            Ok(suite) => suites.push(suite),
            Err(err) => {
                error!("cannot load test '{}': {}", entry.name, err);
                failures.push(LoadFailure {
                    name: entry.name.clone(),
                    class_name: entry.class_name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    (suites, failures)
}

/// Orchestrates one validation run against a device.
///
/// Suites execute in declaration order, each on its own task. A worker
/// holds the shared connection lock for its whole suite, so at most one
/// suite speaks to the device at any instant and the protocol operation
/// order is total.
pub struct Runner {
    session: Arc<dyn DeviceSession>,
    schema: Arc<dyn SchemaBinding>,
    options: RunOptions,
    conn_lock: Arc<Mutex<()>>,
    state: RunState,
}

impl Runner {
    pub fn new(
        session: Arc<dyn DeviceSession>,
        schema: Arc<dyn SchemaBinding>,
        options: RunOptions,
    ) -> Self {
        Self {
            session,
            schema,
            options,
            conn_lock: Arc::new(Mutex::new(())),
            state: RunState::Pending,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Push the profile's initial configurations, honoring the run options.
    pub async fn apply_init_configs(&self, ctx: &TestContext) -> Result<(), InitConfigError> {
        apply_init_configs(
            &ctx.init_configs,
            self.session.as_ref(),
            self.options.stop_on_error,
            self.options.use_replace_for_configs,
        )
        .await
    }

    /// Execute the profile's tests and assemble the run report.
    ///
    /// A runner runs once; reaching the completed state is terminal and a
    /// second dispatch is refused.
    pub async fn run(&mut self, ctx: &TestContext) -> Result<TestRun, RunnerError> {
        let started_at = Utc::now();
        let (suites, failed_to_load) = build_suites(&ctx.tests);
        info!(
            "running {} of {} tests, {} failed to load",
            suites.len(),
            ctx.tests.len(),
            failed_to_load.len()
        );
        if self.options.strict && !failed_to_load.is_empty() {
            return Err(RunnerError::FailedToLoad {
                failed: failed_to_load.len(),
                total: ctx.tests.len(),
            });
        }
        if self.options.stop_on_error {
            info!("stopping if a test fails");
        }
        self.state = self.state.try_transition(RunState::Running)?;

        let env = self.case_env(ctx);
        let total = suites.len();
        let mut results = Vec::with_capacity(total);
        for (index, suite) in suites.into_iter().enumerate() {
            let result = self.dispatch(suite, &env).await;
            let passed = result.succeeded();
            info!(
                "test {}/{} '{}' took {:.1} secs: {}",
                index + 1,
                total,
                result.name,
                result.duration_ms as f64 / 1000.0,
                if passed { "PASSED" } else { "NOT PASSED" }
            );
            results.push(result);
            if self.options.stop_on_error && !passed {
                break;
            }
        }

        self.state = self.state.try_transition(RunState::Completed)?;
        Ok(TestRun::assemble(ctx, results, failed_to_load, started_at))
    }

    fn case_env(&self, ctx: &TestContext) -> CaseEnv {
        let cooldown = ctx
            .target
            .as_ref()
            .filter(|t| t.set_cooldown_secs > 0)
            .map(|t| Duration::from_secs(t.set_cooldown_secs));
        CaseEnv::new(Arc::clone(&self.session), Arc::clone(&self.schema))
            .with_log_protocol(self.options.log_protocol)
            .with_set_cooldown(cooldown)
    }

    /// Run one suite on its own task and collect its result.
    ///
    /// A worker that panics is converted into an errored suite result; the
    /// run itself continues.
    async fn dispatch(&self, suite: TestSuite, env: &CaseEnv) -> SuiteResult {
        let name = suite.name.clone();
        let class_name = suite.class_name.clone();
        let handle = spawn_worker(suite, env.clone(), Arc::clone(&self.conn_lock));
        match handle.await {
            Ok(result) => result,
            Err(err) => {
                error!("worker for suite '{}' crashed: {}", name, err);
                crashed_suite_result(name, class_name, err.to_string())
            }
        }
    }
}

/// Spawn the worker task for one suite.
///
/// The worker takes the connection lock before its first case and holds it
/// until the whole suite finished.
fn spawn_worker(
    mut suite: TestSuite,
    env: CaseEnv,
    conn_lock: Arc<Mutex<()>>,
) -> JoinHandle<SuiteResult> {
    tokio::spawn(async move {
        let _conn = conn_lock.lock().await;
        run_suite(&mut suite, &env).await
    })
}

/// Result standing in for a suite whose worker never reported back.
fn crashed_suite_result(name: String, class_name: String, detail: String) -> SuiteResult {
    let started_at = Utc::now();
    SuiteResult {
        name,
        class_name,
        cases: vec![CaseResult {
            case: "worker".to_string(),
            outcome: Outcome::Error,
            message: Some(detail),
            log: String::new(),
            started_at,
            duration_ms: 0,
        }],
        started_at,
        duration_ms: 0,
    }
}
