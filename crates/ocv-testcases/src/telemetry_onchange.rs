//! Change-driven telemetry over Subscribe ON_CHANGE

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use ocv_context::TestEntry;
use ocv_path::Path;
use ocv_session::{OnChangeResponse, SyncHook};
use ocv_testbase::{CaseContext, CaseFailure, CaseOutcome, RetryPolicy, TestCase};
use ocv_value::TypedValue;
use serde::Deserialize;

use crate::registry::{bad_args, parse_args, BuildError};

#[derive(Debug, Clone, Deserialize)]
struct OnChangeArgs {
    xpath: Path,

    /// Seconds to collect change notifications after the sync marker.
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,

    /// Require every initially reported path to change afterwards.
    #[serde(default)]
    assert_all_paths_updated: bool,
}

fn default_timeout_secs() -> u64 {
    10
}

/// The shared verdict over an on-change exchange: initial updates must fall
/// under the subscribed path, and every later update must carry a value
/// different from the previous one for that path.
fn assert_notifications(args: &OnChangeArgs, response: &OnChangeResponse) -> CaseOutcome {
    if response.before_sync.is_empty() {
        return Err(CaseFailure::failed(
            "no gNMI Subscribe response before sync_response",
        ));
    }
    let mut last: BTreeMap<String, TypedValue> = BTreeMap::new();
    for notification in &response.before_sync {
        for update in &notification.updates {
            if !update.path.matches(&args.xpath) {
                return Err(CaseFailure::failed(format!(
                    "unexpected update path {} for subscription",
                    update.path
                )));
            }
            last.insert(update.path.to_string(), update.value.clone());
        }
    }

    if response.after_sync.is_empty() {
        return Err(CaseFailure::failed(
            "no gNMI Subscribe response after sync_response",
        ));
    }
    let initial_paths: BTreeSet<String> = last.keys().cloned().collect();
    let mut changed: BTreeSet<String> = BTreeSet::new();
    for notification in &response.after_sync {
        for update in &notification.updates {
            let key = update.path.to_string();
            match last.get(&key) {
                Some(previous) if *previous == update.value => {
                    return Err(CaseFailure::failed(format!(
                        "update for {} has the same previous value {}",
                        update.path, update.value
                    )));
                }
                Some(_) => {}
                None => {
                    return Err(CaseFailure::errored(format!(
                        "update for {} outside the initial snapshot",
                        update.path
                    )));
                }
            }
            last.insert(key.clone(), update.value.clone());
            changed.insert(key);
        }
    }

    if args.assert_all_paths_updated {
        let missing: Vec<String> = initial_paths.difference(&changed).cloned().collect();
        if !missing.is_empty() {
            return Err(CaseFailure::failed(format!(
                "no updates after sync_response for paths: {}",
                missing.join(", ")
            )));
        }
    }
    Ok(())
}

/// Watch the path and require the device to report a change on its own.
struct Subscribe {
    args: OnChangeArgs,
}

pub(crate) fn build_subscribe(
    entry: &TestEntry,
    _retry: Option<RetryPolicy>,
) -> Result<Vec<Box<dyn TestCase>>, BuildError> {
    let args: OnChangeArgs = parse_args(entry)?;
    Ok(vec![Box::new(Subscribe { args })])
}

#[async_trait]
impl TestCase for Subscribe {
    fn id(&self) -> &str {
        "0100"
    }

    async fn execute(&mut self, ctx: &mut CaseContext) -> CaseOutcome {
        let response = ctx
            .subscribe_on_change(&self.args.xpath, self.args.timeout_secs, None)
            .await
            .ok_or_else(|| CaseFailure::failed("no gNMI Subscribe response"))?;
        assert_notifications(&self.args, &response)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SubscribeAndSetArgs {
    #[serde(flatten)]
    on_change: OnChangeArgs,
    set_xpath: Path,
    set_value: serde_json::Value,
}

/// Watch the path and provoke the change with a Set once the initial sync
/// arrives.
struct SubscribeAndSet {
    args: OnChangeArgs,
    set_xpath: Path,
    set_value: TypedValue,
}

pub(crate) fn build_subscribe_and_set(
    entry: &TestEntry,
    _retry: Option<RetryPolicy>,
) -> Result<Vec<Box<dyn TestCase>>, BuildError> {
    let args: SubscribeAndSetArgs = parse_args(entry)?;
    let set_value = TypedValue::from_native(&args.set_value).map_err(|err| bad_args(entry, err))?;
    Ok(vec![Box::new(SubscribeAndSet {
        args: args.on_change,
        set_xpath: args.set_xpath,
        set_value,
    })])
}

#[async_trait]
impl TestCase for SubscribeAndSet {
    fn id(&self) -> &str {
        "0100"
    }

    async fn execute(&mut self, ctx: &mut CaseContext) -> CaseOutcome {
        let session = ctx.session();
        let set_path = self.set_xpath.clone();
        let set_value = self.set_value.clone();
        // The Set outcome is judged by the notifications it provokes, not by
        // its own status.
        let hook: SyncHook = Box::new(move || {
            Box::pin(async move {
                let _ = session.set_update(&set_path, set_value).await;
            })
        });

        let response = ctx
            .subscribe_on_change(&self.args.xpath, self.args.timeout_secs, Some(hook))
            .await
            .ok_or_else(|| CaseFailure::failed("no gNMI Subscribe response"))?;
        assert_notifications(&self.args, &response)
    }
}
