//! Read checks built on Get requests

use async_trait::async_trait;
use ocv_context::TestEntry;
use ocv_path::Path;
use ocv_testbase::{CaseContext, CaseFailure, CaseOutcome, RetryPolicy, TestCase};
use serde::Deserialize;

use crate::registry::{parse_args, BuildError};

#[derive(Debug, Clone, Deserialize)]
struct GetArgs {
    xpath: Path,
}

/// A Get of the path must be answered.
struct Get {
    args: GetArgs,
}

pub(crate) fn build_get(
    entry: &TestEntry,
    _retry: Option<RetryPolicy>,
) -> Result<Vec<Box<dyn TestCase>>, BuildError> {
    let args: GetArgs = parse_args(entry)?;
    Ok(vec![Box::new(Get { args })])
}

#[async_trait]
impl TestCase for Get {
    fn id(&self) -> &str {
        "0200"
    }

    async fn execute(&mut self, ctx: &mut CaseContext) -> CaseOutcome {
        ctx.get_required(&self.args.xpath).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GetCompareArgs {
    xpath: Path,
    want: serde_json::Value,
}

/// A Get of the path must carry the wanted value: scalar equality, or the
/// wanted content present for JSON documents.
struct GetCompare {
    args: GetCompareArgs,
    retry: Option<RetryPolicy>,
}

pub(crate) fn build_get_compare(
    entry: &TestEntry,
    retry: Option<RetryPolicy>,
) -> Result<Vec<Box<dyn TestCase>>, BuildError> {
    let args: GetCompareArgs = parse_args(entry)?;
    Ok(vec![Box::new(GetCompare { args, retry })])
}

#[async_trait]
impl TestCase for GetCompare {
    fn id(&self) -> &str {
        "0200"
    }

    fn retry(&self) -> Option<RetryPolicy> {
        self.retry
    }

    async fn execute(&mut self, ctx: &mut CaseContext) -> CaseOutcome {
        let value = ctx.get_required(&self.args.xpath).await?;
        let got = value
            .to_native()
            .map_err(|err| CaseFailure::failed(format!("cannot decode the Get response: {err}")))?;
        if self.args.want.is_object() != got.is_object() {
            return Err(CaseFailure::failed("values of different types"));
        }
        ctx.check_intersect(&self.args.want, &got)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GetJsonCheckArgs {
    xpath: Path,
    model: String,
}

/// A Get of the path must return JSON-IETF valid against the model.
struct GetJsonCheck {
    args: GetJsonCheckArgs,
    retry: Option<RetryPolicy>,
}

pub(crate) fn build_get_json_check(
    entry: &TestEntry,
    retry: Option<RetryPolicy>,
) -> Result<Vec<Box<dyn TestCase>>, BuildError> {
    let args: GetJsonCheckArgs = parse_args(entry)?;
    Ok(vec![Box::new(GetJsonCheck { args, retry })])
}

#[async_trait]
impl TestCase for GetJsonCheck {
    fn id(&self) -> &str {
        "0200"
    }

    fn retry(&self) -> Option<RetryPolicy> {
        self.retry
    }

    async fn execute(&mut self, ctx: &mut CaseContext) -> CaseOutcome {
        let text = ctx.get_json_text(&self.args.xpath).await?;
        ctx.check_json_model(
            &text,
            &self.args.model,
            &self.args.xpath,
            "Get response JSON does not match the model",
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GetJsonCheckCompareArgs {
    xpath: Path,
    model: String,
    want_json: serde_json::Map<String, serde_json::Value>,
}

/// Model check plus content comparison of a Get response.
struct GetJsonCheckCompare {
    xpath: Path,
    model: String,
    want: serde_json::Value,
    retry: Option<RetryPolicy>,
}

pub(crate) fn build_get_json_check_compare(
    entry: &TestEntry,
    retry: Option<RetryPolicy>,
) -> Result<Vec<Box<dyn TestCase>>, BuildError> {
    let args: GetJsonCheckCompareArgs = parse_args(entry)?;
    Ok(vec![Box::new(GetJsonCheckCompare {
        xpath: args.xpath,
        model: args.model,
        want: serde_json::Value::Object(args.want_json),
        retry,
    })])
}

#[async_trait]
impl TestCase for GetJsonCheckCompare {
    fn id(&self) -> &str {
        "0200"
    }

    fn retry(&self) -> Option<RetryPolicy> {
        self.retry
    }

    async fn execute(&mut self, ctx: &mut CaseContext) -> CaseOutcome {
        let text = ctx.get_json_text(&self.xpath).await?;
        ctx.check_json_model(
            &text,
            &self.model,
            &self.xpath,
            "Get response does not match the model",
        )?;
        let got: serde_json::Value = serde_json::from_str(&text)
            .map_err(|err| CaseFailure::errored(format!("Get response is not valid JSON: {err}")))?;
        ctx.check_intersect(&self.want, &got)
    }
}
