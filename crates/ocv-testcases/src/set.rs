//! Write checks built on Set requests

use async_trait::async_trait;
use ocv_context::TestEntry;
use ocv_path::Path;
use ocv_testbase::{CaseContext, CaseOutcome, RetryPolicy, TestCase};
use ocv_value::TypedValue;
use serde::Deserialize;

use crate::registry::{bad_args, parse_args, BuildError};

#[derive(Debug, Clone, Deserialize)]
struct SetUpdateArgs {
    xpath: Path,
    value: serde_json::Value,
}

/// A Set Update of the path must be accepted.
struct SetUpdate {
    xpath: Path,
    value: TypedValue,
}

pub(crate) fn build_set_update(
    entry: &TestEntry,
    _retry: Option<RetryPolicy>,
) -> Result<Vec<Box<dyn TestCase>>, BuildError> {
    let args: SetUpdateArgs = parse_args(entry)?;
    let value = TypedValue::from_native(&args.value).map_err(|err| bad_args(entry, err))?;
    Ok(vec![Box::new(SetUpdate {
        xpath: args.xpath,
        value,
    })])
}

#[async_trait]
impl TestCase for SetUpdate {
    fn id(&self) -> &str {
        "0200"
    }

    async fn execute(&mut self, ctx: &mut CaseContext) -> CaseOutcome {
        let ok = ctx.set_update(&self.xpath, self.value.clone()).await;
        ctx.check(ok, "gNMI Set did not succeed")
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SetDeleteArgs {
    xpath: Path,
}

/// A Set Delete of the path must be accepted.
struct SetDelete {
    args: SetDeleteArgs,
}

pub(crate) fn build_set_delete(
    entry: &TestEntry,
    _retry: Option<RetryPolicy>,
) -> Result<Vec<Box<dyn TestCase>>, BuildError> {
    let args: SetDeleteArgs = parse_args(entry)?;
    Ok(vec![Box::new(SetDelete { args })])
}

#[async_trait]
impl TestCase for SetDelete {
    fn id(&self) -> &str {
        "0200"
    }

    async fn execute(&mut self, ctx: &mut CaseContext) -> CaseOutcome {
        let ok = ctx.set_delete(&self.args.xpath).await;
        ctx.check(ok, "gNMI Set did not succeed")
    }
}

#[derive(Debug, Clone, Deserialize)]
struct JsonCheckSetUpdateArgs {
    xpath: Path,
    model: String,
    json_value: serde_json::Map<String, serde_json::Value>,
}

/// The JSON document must validate against the model before it is sent.
struct JsonCheckSetUpdate {
    xpath: Path,
    model: String,
    json_text: String,
}

pub(crate) fn build_json_check_set_update(
    entry: &TestEntry,
    _retry: Option<RetryPolicy>,
) -> Result<Vec<Box<dyn TestCase>>, BuildError> {
    let args: JsonCheckSetUpdateArgs = parse_args(entry)?;
    Ok(vec![Box::new(JsonCheckSetUpdate {
        xpath: args.xpath,
        model: args.model,
        json_text: serde_json::Value::Object(args.json_value).to_string(),
    })])
}

#[async_trait]
impl TestCase for JsonCheckSetUpdate {
    fn id(&self) -> &str {
        "0100"
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
        ctx.check(ok, "gNMI Set did not succeed")
    }
}
