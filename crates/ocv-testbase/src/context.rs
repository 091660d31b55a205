//! Per-case execution context: session access, checks and log capture

use ocv_compare::intersect_cmp;
use ocv_path::Path;
use ocv_schema::SchemaBinding;
use ocv_session::{
    notifications_json, DeviceSession, Notification, OnChangeResponse, SyncHook,
};
use ocv_value::TypedValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::case::{CaseFailure, CaseOutcome};

/// Shared wiring handed to every case of a run
#[derive(Clone)]
pub struct CaseEnv {
    pub session: Arc<dyn DeviceSession>,
    pub schema: Arc<dyn SchemaBinding>,
    /// Copy protocol requests and responses into the case logs.
    pub log_protocol: bool,
    /// Pause after each successful Set before issuing further operations.
    pub set_cooldown: Option<Duration>,
}

impl CaseEnv {
    pub fn new(session: Arc<dyn DeviceSession>, schema: Arc<dyn SchemaBinding>) -> Self {
        Self {
            session,
            schema,
            log_protocol: false,
            set_cooldown: None,
        }
    }

    pub fn with_log_protocol(mut self, on: bool) -> Self {
        self.log_protocol = on;
        self
    }

    pub fn with_set_cooldown(mut self, cooldown: Option<Duration>) -> Self {
        self.set_cooldown = cooldown;
        self
    }

    /// Fresh context for one case execution.
    pub fn case_context(&self) -> CaseContext {
        CaseContext {
            env: self.clone(),
            log: Vec::new(),
        }
    }
}

/// Execution context handed to a running case
///
/// Wraps the device session so that protocol errors never abort a case:
/// failed operations land in the case log and surface as `None` or `false`,
/// and the case converts their absence into a failed check. Check helpers
/// return `CaseOutcome` so cases chain them with `?`.
pub struct CaseContext {
    env: CaseEnv,
    log: Vec<String>,
}

impl CaseContext {
    /// Append a line to the case log.
    pub fn log(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        debug!("{}", msg);
        self.log.push(msg);
    }

    /// The accumulated case log.
    pub fn log_text(&self) -> String {
        self.log.join("\n")
    }

    pub fn schema(&self) -> &dyn SchemaBinding {
        self.env.schema.as_ref()
    }

    /// Handle on the underlying session, for callbacks that outlive the
    /// borrow on this context.
    pub fn session(&self) -> Arc<dyn DeviceSession> {
        Arc::clone(&self.env.session)
    }

    fn log_protocol_line(&mut self, line: String) {
        info!("{}", line);
        self.log.push(line);
    }

    async fn cooldown(&self) {
        if let Some(delay) = self.env.set_cooldown {
            tokio::time::sleep(delay).await;
        }
    }

    /// Retrieve a path's value. Protocol errors are logged and yield `None`.
    pub async fn get(&mut self, path: &Path) -> Option<TypedValue> {
        match self.env.session.get(path).await {
            Ok(value) => {
                if self.env.log_protocol {
                    self.log_protocol_line(format!("Get({}) <= {}", path, value));
                }
                Some(value)
            }
            Err(err) => {
                self.log(format!("Get({}) <= Error: {}", path, err));
                None
            }
        }
    }

    /// Retrieve a path's value, failing the check when there is none.
    pub async fn get_required(&mut self, path: &Path) -> Result<TypedValue, CaseFailure> {
        self.get(path)
            .await
            .ok_or_else(|| CaseFailure::failed(format!("no Get response from {}", path)))
    }

    /// Retrieve a path's value and require a JSON-IETF payload.
    pub async fn get_json_text(&mut self, path: &Path) -> Result<String, CaseFailure> {
        let value = self.get_required(path).await?;
        match value.as_json_text() {
            Some(text) => Ok(text.to_string()),
            None => Err(CaseFailure::failed(format!(
                "the Get response from {} is not JSON-IETF: {}",
                path, value
            ))),
        }
    }

    /// Merge a value at a path. False when the Set failed.
    pub async fn set_update(&mut self, path: &Path, value: TypedValue) -> bool {
        if self.env.log_protocol {
            self.log_protocol_line(format!("Set Update({}) => {}", path, value));
        }
        match self.env.session.set_update(path, value).await {
            Ok(()) => {
                self.cooldown().await;
                true
            }
            Err(err) => {
                self.log(format!("Set({}) <= Error: {}", path, err));
                false
            }
        }
    }

    /// Replace the subtree at a path. False when the Set failed.
    pub async fn set_replace(&mut self, path: &Path, value: TypedValue) -> bool {
        if self.env.log_protocol {
            self.log_protocol_line(format!("Set Replace({}) => {}", path, value));
        }
        match self.env.session.set_replace(path, value).await {
            Ok(()) => {
                self.cooldown().await;
                true
            }
            Err(err) => {
                self.log(format!("Set({}) <= Error: {}", path, err));
                false
            }
        }
    }

    /// Delete the subtree at a path. False when the Set failed.
    pub async fn set_delete(&mut self, path: &Path) -> bool {
        if self.env.log_protocol {
            self.log_protocol_line(format!("Set Delete({}) =>", path));
        }
        match self.env.session.set_delete(path).await {
            Ok(()) => {
                self.cooldown().await;
                true
            }
            Err(err) => {
                self.log(format!("Set({}) <= Error: {}", path, err));
                false
            }
        }
    }

    /// One-off snapshot of the subtrees under the given paths.
    pub async fn subscribe_once(&mut self, paths: &[Path]) -> Option<Vec<Notification>> {
        match self.env.session.subscribe_once(paths).await {
            Ok(notifications) => {
                if self.env.log_protocol {
                    self.log_protocol_line(format!(
                        "SubscribeOnce({}) <= {}",
                        join_paths(paths),
                        notifications_json(&notifications)
                    ));
                }
                Some(notifications)
            }
            Err(err) => {
                self.log(format!(
                    "SubscribeOnce({}) <= Error: {}",
                    join_paths(paths),
                    err
                ));
                None
            }
        }
    }

    /// Periodic samples of a path over a held-open stream.
    pub async fn subscribe_sample(
        &mut self,
        path: &Path,
        interval_nanos: u64,
        timeout_secs: u64,
    ) -> Option<Vec<Notification>> {
        match self
            .env
            .session
            .subscribe_sample(path, interval_nanos, timeout_secs)
            .await
        {
            Ok(notifications) => {
                if self.env.log_protocol {
                    self.log_protocol_line(format!(
                        "SubscribeSample({}) <= {}",
                        path,
                        notifications_json(&notifications)
                    ));
                }
                Some(notifications)
            }
            Err(err) => {
                self.log(format!("SubscribeSample({}) <= Error: {}", path, err));
                None
            }
        }
    }

    /// Watch a path for changes around the initial-sync marker.
    pub async fn subscribe_on_change(
        &mut self,
        path: &Path,
        timeout_secs: u64,
        on_sync: Option<SyncHook>,
    ) -> Option<OnChangeResponse> {
        match self
            .env
            .session
            .subscribe_on_change(path, timeout_secs, on_sync)
            .await
        {
            Ok(response) => {
                if self.env.log_protocol {
                    let mut all = response.before_sync.clone();
                    all.extend(response.after_sync.iter().cloned());
                    self.log_protocol_line(format!(
                        "SubscribeOnChange({}) <= {}",
                        path,
                        notifications_json(&all)
                    ));
                }
                Some(response)
            }
            Err(err) => {
                self.log(format!("SubscribeOnChange({}) <= Error: {}", path, err));
                None
            }
        }
    }

    /// Fail the check with `msg` unless `cond` holds.
    pub fn check(&self, cond: bool, msg: impl Into<String>) -> CaseOutcome {
        if cond {
            Ok(())
        } else {
            Err(CaseFailure::Failed(msg.into()))
        }
    }

    /// Validate a JSON-IETF document against a model container.
    pub fn check_json_model(
        &self,
        json_text: &str,
        model: &str,
        path: &Path,
        msg: &str,
    ) -> CaseOutcome {
        self.env
            .schema
            .validate(json_text, model, path)
            .map_err(|err| CaseFailure::failed(format!("{}: {}", msg, err)))
    }

    /// Require the wanted JSON content to be present in the received one.
    pub fn check_intersect(
        &self,
        want: &serde_json::Value,
        got: &serde_json::Value,
    ) -> CaseOutcome {
        let cmp = intersect_cmp(want, got);
        if cmp.matched {
            Ok(())
        } else {
            Err(CaseFailure::Failed(cmp.diff))
        }
    }
}

fn join_paths(paths: &[Path]) -> String {
    paths
        .iter()
        .map(Path::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
