//! Intended-state checks: configure under `/config`, observe under `/state`

use std::sync::Arc;

use async_trait::async_trait;
use ocv_context::TestEntry;
use ocv_path::Path;
use ocv_testbase::{CaseContext, CaseFailure, CaseOutcome, RetryPolicy, TestCase};
use ocv_value::TypedValue;
use serde::Deserialize;

use crate::registry::{bad_args, parse_args, BuildError};

#[derive(Debug, Clone, Deserialize)]
struct SetConfigArgs {
    /// Container path without the trailing `/config` or `/state`.
    xpath: Path,
    model: String,
    json_value: serde_json::Map<String, serde_json::Value>,
}

struct SetConfigShared {
    config_path: Path,
    state_path: Path,
    model: String,
    json_text: String,
    want: serde_json::Value,
}

enum SetConfigStep {
    SetConfig,
    CheckConfig,
    CheckState,
}

/// Write the document to `/config`, then require it back from `/config` and,
/// once the device converges, from `/state`.
struct SetConfigCheckState {
    step: SetConfigStep,
    shared: Arc<SetConfigShared>,
    retry: Option<RetryPolicy>,
}

pub(crate) fn build_set_config_check_state(
    entry: &TestEntry,
    retry: Option<RetryPolicy>,
) -> Result<Vec<Box<dyn TestCase>>, BuildError> {
    let args: SetConfigArgs = parse_args(entry)?;
    let config_path = args.xpath.join("config").map_err(|err| bad_args(entry, err))?;
    let state_path = args.xpath.join("state").map_err(|err| bad_args(entry, err))?;
    let want = serde_json::Value::Object(args.json_value);
    let shared = Arc::new(SetConfigShared {
        config_path,
        state_path,
        model: args.model,
        json_text: want.to_string(),
        want,
    });
    Ok(vec![
        Box::new(SetConfigCheckState {
            step: SetConfigStep::SetConfig,
            shared: Arc::clone(&shared),
            retry,
        }),
        Box::new(SetConfigCheckState {
            step: SetConfigStep::CheckConfig,
            shared: Arc::clone(&shared),
            retry,
        }),
        Box::new(SetConfigCheckState {
            step: SetConfigStep::CheckState,
            shared,
            retry,
        }),
    ])
}

impl SetConfigCheckState {
    async fn check_container(&self, ctx: &mut CaseContext, path: &Path, msg: &str) -> CaseOutcome {
        let text = ctx.get_json_text(path).await?;
        ctx.check_json_model(&text, &self.shared.model, path, msg)?;
        let got: serde_json::Value = serde_json::from_str(&text)
            .map_err(|err| CaseFailure::errored(format!("Get response is not valid JSON: {err}")))?;
        ctx.check_intersect(&self.shared.want, &got)
    }
}

#[async_trait]
impl TestCase for SetConfigCheckState {
    fn id(&self) -> &str {
        match self.step {
            SetConfigStep::SetConfig => "0100",
            SetConfigStep::CheckConfig => "0200",
            SetConfigStep::CheckState => "0300",
        }
    }

    fn retry(&self) -> Option<RetryPolicy> {
        // The write itself is not retried; the convergence checks are.
        match self.step {
            SetConfigStep::SetConfig => None,
            SetConfigStep::CheckConfig | SetConfigStep::CheckState => self.retry,
        }
    }

    async fn execute(&mut self, ctx: &mut CaseContext) -> CaseOutcome {
        match self.step {
            SetConfigStep::SetConfig => {
                ctx.check_json_model(
                    &self.shared.json_text,
                    &self.shared.model,
                    &self.shared.config_path,
                    "JSON value to Set does not match the model",
                )?;
                let ok = ctx
                    .set_update(
                        &self.shared.config_path,
                        TypedValue::Json(self.shared.json_text.clone()),
                    )
                    .await;
                ctx.check(ok, "gNMI Set did not succeed")
            }
            SetConfigStep::CheckConfig => {
                self.check_container(
                    ctx,
                    &self.shared.config_path,
                    "Get /config does not match the model",
                )
                .await
            }
            SetConfigStep::CheckState => {
                self.check_container(
                    ctx,
                    &self.shared.state_path,
                    "Get /state does not match the model",
                )
                .await
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct DeleteConfigArgs {
    /// Container path without the trailing `/config` or `/state`.
    xpath: Path,
}

struct DeleteShared {
    base: Path,
    config_path: Path,
    state_path: Path,
}

enum DeleteStep {
    CheckExists,
    Delete,
    CheckConfigGone,
    CheckStateGone,
}

/// Delete a configured container and require both its `/config` and `/state`
/// twins to disappear.
struct DeleteConfigCheckState {
    step: DeleteStep,
    shared: Arc<DeleteShared>,
    retry: Option<RetryPolicy>,
}

pub(crate) fn build_delete_config_check_state(
    entry: &TestEntry,
    retry: Option<RetryPolicy>,
) -> Result<Vec<Box<dyn TestCase>>, BuildError> {
    let args: DeleteConfigArgs = parse_args(entry)?;
    let config_path = args.xpath.join("config").map_err(|err| bad_args(entry, err))?;
    let state_path = args.xpath.join("state").map_err(|err| bad_args(entry, err))?;
    let shared = Arc::new(DeleteShared {
        base: args.xpath,
        config_path,
        state_path,
    });
    Ok(vec![
        Box::new(DeleteConfigCheckState {
            step: DeleteStep::CheckExists,
            shared: Arc::clone(&shared),
            retry,
        }),
        Box::new(DeleteConfigCheckState {
            step: DeleteStep::Delete,
            shared: Arc::clone(&shared),
            retry,
        }),
        Box::new(DeleteConfigCheckState {
            step: DeleteStep::CheckConfigGone,
            shared: Arc::clone(&shared),
            retry,
        }),
        Box::new(DeleteConfigCheckState {
            step: DeleteStep::CheckStateGone,
            shared,
            retry,
        }),
    ])
}

#[async_trait]
impl TestCase for DeleteConfigCheckState {
    fn id(&self) -> &str {
        match self.step {
            DeleteStep::CheckExists => "0100",
            DeleteStep::Delete => "0200",
            DeleteStep::CheckConfigGone => "0300",
            DeleteStep::CheckStateGone => "0400",
        }
    }

    fn retry(&self) -> Option<RetryPolicy> {
        match self.step {
            DeleteStep::CheckExists | DeleteStep::Delete => None,
            DeleteStep::CheckConfigGone | DeleteStep::CheckStateGone => self.retry,
        }
    }

    async fn execute(&mut self, ctx: &mut CaseContext) -> CaseOutcome {
        match self.step {
            DeleteStep::CheckExists => {
                let got = ctx.get(&self.shared.config_path).await;
                ctx.check(
                    got.is_some(),
                    "there is no configured /config container for the path",
                )
            }
            DeleteStep::Delete => {
                let ok = ctx.set_delete(&self.shared.base).await;
                ctx.check(ok, "gNMI Delete did not succeed")
            }
            DeleteStep::CheckConfigGone => {
                let got = ctx.get(&self.shared.config_path).await;
                ctx.check(
                    got.is_none(),
                    "there is still a /config container for the path",
                )
            }
            DeleteStep::CheckStateGone => {
                let got = ctx.get(&self.shared.state_path).await;
                ctx.check(
                    got.is_none(),
                    "there is still a /state container for the path",
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::build_suite;
    use ocv_fakedevice::FakeDevice;
    use ocv_schema::SchemaCatalog;
    use ocv_testbase::{run_suite, CaseEnv, Outcome, SuiteResult};
    use serde_json::json;

    fn entry(class_name: &str, args: serde_json::Value) -> TestEntry {
        TestEntry {
            name: "example".to_string(),
            class_name: class_name.to_string(),
            args: args.as_object().cloned().unwrap_or_default(),
        }
    }

    fn path(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn ntp_catalog() -> SchemaCatalog {
        SchemaCatalog::new().with_model(
            "system",
            json!({
                "type": "object",
                "properties": {
                    "system": {
                        "type": "object",
                        "properties": {
                            "ntp": {
                                "type": "object",
                                "properties": {
                                    "config": {
                                        "type": "object",
                                        "properties": {"enabled": {"type": "boolean"}}
                                    },
                                    "state": {
                                        "type": "object",
                                        "properties": {"enabled": {"type": "boolean"}}
                                    }
                                }
                            }
                        }
                    }
                }
            }),
        )
    }

    async fn run_on(
        device: &Arc<FakeDevice>,
        class: &str,
        args: serde_json::Value,
    ) -> SuiteResult {
        let mut suite = build_suite(&entry(class, args)).unwrap();
        let env = CaseEnv::new(device.clone(), Arc::new(ntp_catalog()));
        run_suite(&mut suite, &env).await
    }

    #[tokio::test]
    async fn test_set_config_converges_into_state() {
        let device = Arc::new(FakeDevice::new().with_state_reflection());
        let result = run_on(
            &device,
            "config_state.SetConfigCheckState",
            json!({
                "xpath": "/system/ntp",
                "model": "system",
                "json_value": {"enabled": true},
            }),
        )
        .await;
        assert!(result.succeeded(), "{:?}", result.cases);
        assert_eq!(result.cases.len(), 3);
        assert!(device.value_at(&path("/system/ntp/state")).is_some());
    }

    #[tokio::test]
    async fn test_state_check_fails_without_convergence() {
        let device = Arc::new(FakeDevice::new());
        let result = run_on(
            &device,
            "config_state.SetConfigCheckState",
            json!({
                "xpath": "/system/ntp",
                "model": "system",
                "json_value": {"enabled": true},
            }),
        )
        .await;
        assert_eq!(result.cases[0].outcome, Outcome::Pass);
        assert_eq!(result.cases[1].outcome, Outcome::Pass);
        assert_eq!(result.cases[2].outcome, Outcome::Fail);
        assert_eq!(
            result.cases[2].message.as_deref(),
            Some("no Get response from /system/ntp/state")
        );
    }

    #[tokio::test]
    async fn test_delete_clears_config_and_state() {
        let device = Arc::new(
            FakeDevice::new()
                .with_state_reflection()
                .with_leaf(
                    path("/system/ntp/config"),
                    TypedValue::Json(json!({"enabled": true}).to_string()),
                )
                .with_leaf(
                    path("/system/ntp/state"),
                    TypedValue::Json(json!({"enabled": true}).to_string()),
                ),
        );
        let result = run_on(
            &device,
            "config_state.DeleteConfigCheckState",
            json!({"xpath": "/system/ntp"}),
        )
        .await;
        assert!(result.succeeded(), "{:?}", result.cases);
        assert_eq!(result.cases.len(), 4);
        assert!(device.value_at(&path("/system/ntp/config")).is_none());
        assert!(device.value_at(&path("/system/ntp/state")).is_none());
    }

    #[tokio::test]
    async fn test_delete_requires_existing_config() {
        let device = Arc::new(FakeDevice::new());
        let result = run_on(
            &device,
            "config_state.DeleteConfigCheckState",
            json!({"xpath": "/system/ntp"}),
        )
        .await;
        assert_eq!(result.cases[0].outcome, Outcome::Fail);
        assert_eq!(
            result.cases[0].message.as_deref(),
            Some("there is no configured /config container for the path")
        );
        // Without fail-fast the remaining steps still run against the
        // already-empty tree.
        assert_eq!(result.cases[2].outcome, Outcome::Pass);
        assert_eq!(result.cases[3].outcome, Outcome::Pass);
    }
}
