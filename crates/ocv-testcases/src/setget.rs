//! Set-then-Get round trips with schema checks

use async_trait::async_trait;
use ocv_context::TestEntry;
use ocv_path::Path;
use ocv_testbase::{CaseContext, CaseFailure, CaseOutcome, RetryPolicy, TestCase};
use ocv_value::TypedValue;
use serde::Deserialize;

use crate::registry::{parse_args, BuildError};

#[derive(Debug, Clone, Deserialize)]
struct SetGetArgs {
    xpath: Path,
    model: String,
    json_value: serde_json::Map<String, serde_json::Value>,
}

/// Validate a JSON document, Set it, Get it back and model-check the reply.
/// With `want` present the reply content is also compared to what was sent.
struct SetGetRoundTrip {
    xpath: Path,
    model: String,
    json_text: String,
    want: Option<serde_json::Value>,
    retry: Option<RetryPolicy>,
}

pub(crate) fn build_set_get_json_check(
    entry: &TestEntry,
    retry: Option<RetryPolicy>,
) -> Result<Vec<Box<dyn TestCase>>, BuildError> {
    let args: SetGetArgs = parse_args(entry)?;
    Ok(vec![Box::new(SetGetRoundTrip {
        xpath: args.xpath,
        model: args.model,
        json_text: serde_json::Value::Object(args.json_value).to_string(),
        want: None,
        retry,
    })])
}

pub(crate) fn build_set_get_json_check_compare(
    entry: &TestEntry,
    retry: Option<RetryPolicy>,
) -> Result<Vec<Box<dyn TestCase>>, BuildError> {
    let args: SetGetArgs = parse_args(entry)?;
    let want = serde_json::Value::Object(args.json_value);
    Ok(vec![Box::new(SetGetRoundTrip {
        xpath: args.xpath,
        model: args.model,
        json_text: want.to_string(),
        want: Some(want),
        retry,
    })])
}

#[async_trait]
impl TestCase for SetGetRoundTrip {
    fn id(&self) -> &str {
        "0100"
    }

    fn retry(&self) -> Option<RetryPolicy> {
        self.retry
    }

    async fn execute(&mut self, ctx: &mut CaseContext) -> CaseOutcome {
        ctx.check_json_model(
            &self.json_text,
            &self.model,
            &self.xpath,
            "JSON value to Set does not match the model",
        )?;
        let ok = ctx
            .set_update(&self.xpath, TypedValue::Json(self.json_text.clone()))
            .await;
        ctx.check(ok, "gNMI Set did not succeed")?;
        let text = ctx.get_json_text(&self.xpath).await?;
        ctx.check_json_model(
            &text,
            &self.model,
            &self.xpath,
            "Get response JSON does not match the model",
        )?;
        if let Some(want) = &self.want {
            let got: serde_json::Value = serde_json::from_str(&text).map_err(|err| {
                CaseFailure::errored(format!("Get response is not valid JSON: {err}"))
            })?;
            ctx.check_intersect(want, &got)?;
        }
        Ok(())
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
    use std::sync::Arc;

    fn entry(class_name: &str, args: serde_json::Value) -> TestEntry {
        TestEntry {
            name: "example".to_string(),
            class_name: class_name.to_string(),
            args: args.as_object().cloned().unwrap_or_default(),
        }
    }

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new().with_model(
            "system",
            json!({
                "type": "object",
                "properties": {
                    "system": {
                        "type": "object",
                        "properties": {
                            "config": {
                                "type": "object",
                                "properties": {
                                    "hostname": {"type": "string"},
                                    "domain-name": {"type": "string"}
                                },
                                "additionalProperties": false
                            }
                        }
                    }
                }
            }),
        )
    }

    async fn run(class: &str, args: serde_json::Value, device: FakeDevice) -> SuiteResult {
        let mut suite = build_suite(&entry(class, args)).unwrap();
        let env = CaseEnv::new(Arc::new(device), Arc::new(catalog()));
        run_suite(&mut suite, &env).await
    }

    #[tokio::test]
    async fn test_round_trip_passes() {
        let result = run(
            "setget.SetGetJsonCheck",
            json!({
                "xpath": "/system/config",
                "model": "system",
                "json_value": {"hostname": "switch1"},
            }),
            FakeDevice::new(),
        )
        .await;
        assert!(result.succeeded(), "{:?}", result.cases[0].message);
    }

    #[tokio::test]
    async fn test_round_trip_with_compare_passes() {
        let result = run(
            "setget.SetGetJsonCheckCompare",
            json!({
                "xpath": "/system/config",
                "model": "system",
                "json_value": {"hostname": "switch1", "domain-name": "lab"},
            }),
            FakeDevice::new(),
        )
        .await;
        assert!(result.succeeded(), "{:?}", result.cases[0].message);
    }

    #[tokio::test]
    async fn test_invalid_document_never_reaches_the_device() {
        let result = run(
            "setget.SetGetJsonCheck",
            json!({
                "xpath": "/system/config",
                "model": "system",
                "json_value": {"hostname": 17},
            }),
            FakeDevice::new(),
        )
        .await;
        assert_eq!(result.cases[0].outcome, Outcome::Fail);
        assert!(result.cases[0]
            .message
            .as_deref()
            .unwrap()
            .starts_with("JSON value to Set does not match the model"));
    }

    #[tokio::test]
    async fn test_rejected_set_fails_the_case() {
        let device = FakeDevice::new();
        device.fail_at(&Path::parse("/system/config").unwrap());
        let result = run(
            "setget.SetGetJsonCheck",
            json!({
                "xpath": "/system/config",
                "model": "system",
                "json_value": {"hostname": "switch1"},
            }),
            device,
        )
        .await;
        assert_eq!(result.cases[0].outcome, Outcome::Fail);
        assert_eq!(
            result.cases[0].message.as_deref(),
            Some("gNMI Set did not succeed")
        );
    }
}
