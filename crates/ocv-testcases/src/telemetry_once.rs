//! One-off telemetry snapshots over Subscribe ONCE

use async_trait::async_trait;
use ocv_context::TestEntry;
use ocv_path::Path;
use ocv_schema::SchemaBinding;
use ocv_session::Notification;
use ocv_testbase::{CaseContext, CaseFailure, CaseOutcome, RetryPolicy, TestCase};
use serde::Deserialize;

use crate::registry::{parse_args, BuildError};

#[derive(Debug, Clone, Deserialize)]
struct OnceArgs {
    xpaths: Vec<Path>,

    /// Expected number of notifications, when given.
    #[serde(default)]
    notifications_count: Option<usize>,

    /// Maximum age of the reply timestamps relative to the request, when
    /// given.
    #[serde(default)]
    max_delay_secs: Option<i64>,
}

/// Subscribe and apply the optional count and delay checks shared by the
/// snapshot classes.
async fn subscribe_checked(
    ctx: &mut CaseContext,
    args: &OnceArgs,
) -> Result<Vec<Notification>, CaseFailure> {
    let now_secs = chrono::Utc::now().timestamp();
    let responses = ctx
        .subscribe_once(&args.xpaths)
        .await
        .ok_or_else(|| CaseFailure::failed("no gNMI Subscribe response"))?;

    if let Some(max_delay) = args.max_delay_secs {
        for notification in &responses {
            let diff = notification.timestamp_nanos / 1_000_000_000 - now_secs;
            if diff <= -max_delay || diff >= max_delay {
                return Err(CaseFailure::failed(format!(
                    "timestamp diff too long: {diff} secs"
                )));
            }
        }
    }
    if let Some(want) = args.notifications_count {
        let got = responses.len();
        if got != want {
            return Err(CaseFailure::failed(format!(
                "expected {want} notifications, got {got}"
            )));
        }
    }
    Ok(responses)
}

#[derive(Debug, Clone, Deserialize)]
struct CountUpdatesCheckTypeArgs {
    #[serde(flatten)]
    once: OnceArgs,
    values_type: String,
    updates_count: usize,
}

/// Snapshot must carry the expected number of updates, every value of the
/// expected type.
struct CountUpdatesCheckType {
    args: CountUpdatesCheckTypeArgs,
}

pub(crate) fn build_count_updates_check_type(
    entry: &TestEntry,
    _retry: Option<RetryPolicy>,
) -> Result<Vec<Box<dyn TestCase>>, BuildError> {
    let args: CountUpdatesCheckTypeArgs = parse_args(entry)?;
    Ok(vec![Box::new(CountUpdatesCheckType { args })])
}

#[async_trait]
impl TestCase for CountUpdatesCheckType {
    fn id(&self) -> &str {
        "0100"
    }

    async fn execute(&mut self, ctx: &mut CaseContext) -> CaseOutcome {
        let responses = subscribe_checked(ctx, &self.args.once).await?;

        // Wire-style type names ("uint_val") are accepted alongside the
        // short kinds ("uint").
        let want_kind = self
            .args
            .values_type
            .strip_suffix("_val")
            .unwrap_or(&self.args.values_type);

        let mut updates = 0usize;
        for notification in &responses {
            updates += notification.updates.len();
            for update in &notification.updates {
                if update.value.kind() != want_kind {
                    return Err(CaseFailure::failed(format!(
                        "value of update {} is not of type {}: {}",
                        update.path, self.args.values_type, update.value
                    )));
                }
            }
        }
        ctx.check(
            updates == self.args.updates_count,
            format!("expected {} updates, got {}", self.args.updates_count, updates),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CheckStateLeafsArgs {
    #[serde(flatten)]
    once: OnceArgs,
    model: String,

    /// Also require every model leaf to appear in the snapshot.
    #[serde(default)]
    check_missing_model_paths: bool,
}

/// Every snapshot update path must be a leaf of the model below the
/// subscribed `/state` containers.
struct CheckStateLeafs {
    args: CheckStateLeafsArgs,
}

pub(crate) fn build_check_state_leafs(
    entry: &TestEntry,
    _retry: Option<RetryPolicy>,
) -> Result<Vec<Box<dyn TestCase>>, BuildError> {
    let args: CheckStateLeafsArgs = parse_args(entry)?;
    Ok(vec![Box::new(CheckStateLeafs { args })])
}

impl CheckStateLeafs {
    /// Model leaf paths below the state container of each subscribed path.
    fn want_paths(&self, schema: &dyn SchemaBinding) -> Result<Vec<Path>, CaseFailure> {
        let mut want = Vec::new();
        for xpath in &self.args.once.xpaths {
            let state_root = if xpath.leaf().map(|e| e.name()) == Some("state") {
                xpath.clone()
            } else {
                xpath.join("state").map_err(|err| {
                    CaseFailure::errored(format!("cannot derive the state path of {xpath}: {err}"))
                })?
            };
            let leaf_paths = schema
                .leaf_paths(&self.args.model, &state_root)
                .map_err(|err| CaseFailure::failed(err.to_string()))?;
            for text in &leaf_paths {
                let parsed = Path::parse(text).map_err(|err| {
                    CaseFailure::errored(format!("model leaf path '{text}' does not parse: {err}"))
                })?;
                want.push(parsed);
            }
        }
        Ok(want)
    }
}

#[async_trait]
impl TestCase for CheckStateLeafs {
    fn id(&self) -> &str {
        "0100"
    }

    async fn execute(&mut self, ctx: &mut CaseContext) -> CaseOutcome {
        let responses = subscribe_checked(ctx, &self.args.once).await?;
        let want = self.want_paths(ctx.schema())?;

        let mut got_paths: Vec<&Path> = Vec::new();
        for notification in &responses {
            for update in &notification.updates {
                if !update.path.matches_any(&want) {
                    return Err(CaseFailure::failed(format!(
                        "unexpected update path {} for model {}",
                        update.path, self.args.model
                    )));
                }
                got_paths.push(&update.path);
            }
        }
        ctx.check(
            !got_paths.is_empty(),
            "there are no updates as reply to the subscription",
        )?;

        if self.args.check_missing_model_paths {
            for want_path in &want {
                if !got_paths.iter().any(|got| got.matches(want_path)) {
                    return Err(CaseFailure::failed(format!(
                        "missing update path {} for model {}",
                        want_path, self.args.model
                    )));
                }
            }
        }
        Ok(())
    }
}
