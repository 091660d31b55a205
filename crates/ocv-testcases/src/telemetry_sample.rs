//! Periodic telemetry over Subscribe SAMPLE

use std::collections::BTreeMap;

use async_trait::async_trait;
use ocv_context::TestEntry;
use ocv_path::Path;
use ocv_testbase::{CaseContext, CaseFailure, CaseOutcome, RetryPolicy, TestCase};
use serde::Deserialize;

use crate::registry::{bad_args, parse_args, BuildError};

#[derive(Debug, Clone, Deserialize)]
struct SampleArgs {
    xpath: Path,

    /// Seconds between samples.
    sample_interval: u64,

    /// Seconds to keep the subscription open.
    sample_timeout: u64,

    /// Tolerated deviation of consecutive timestamps from the interval.
    #[serde(default = "default_max_drift_secs")]
    max_timestamp_drift_secs: i64,
}

fn default_max_drift_secs() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
struct CountUpdatesArgs {
    #[serde(flatten)]
    sample: SampleArgs,

    /// Expected number of distinct update paths per reply.
    update_paths_count: usize,
}

/// Every sampled path must report once per interval, on schedule, and the
/// stream must consistently carry the expected set of paths.
struct CountUpdates {
    args: CountUpdatesArgs,
}

pub(crate) fn build_count_updates(
    entry: &TestEntry,
    _retry: Option<RetryPolicy>,
) -> Result<Vec<Box<dyn TestCase>>, BuildError> {
    let args: CountUpdatesArgs = parse_args(entry)?;
    if args.sample.sample_interval == 0 {
        return Err(bad_args(entry, "sample_interval must be positive"));
    }
    Ok(vec![Box::new(CountUpdates { args })])
}

#[async_trait]
impl TestCase for CountUpdates {
    fn id(&self) -> &str {
        "0100"
    }

    async fn execute(&mut self, ctx: &mut CaseContext) -> CaseOutcome {
        let interval_nanos = self.args.sample.sample_interval * 1_000_000_000;
        let responses = ctx
            .subscribe_sample(
                &self.args.sample.xpath,
                interval_nanos,
                self.args.sample.sample_timeout,
            )
            .await
            .ok_or_else(|| CaseFailure::failed("no gNMI Subscribe response"))?;

        let mut per_path: BTreeMap<String, Vec<i64>> = BTreeMap::new();
        for notification in &responses {
            for update in &notification.updates {
                per_path
                    .entry(update.path.to_string())
                    .or_default()
                    .push(notification.timestamp_nanos);
            }
        }

        let want = (self.args.sample.sample_timeout / self.args.sample.sample_interval) as usize + 1;
        for (path, stamps) in &per_path {
            ctx.check(
                stamps.len() == want,
                format!("{} updates for path {}, wanted {}", stamps.len(), path, want),
            )?;
            for pair in stamps.windows(2) {
                let diff_secs = (pair[1] - pair[0]) / 1_000_000_000;
                let drift = (diff_secs - self.args.sample.sample_interval as i64).abs();
                ctx.check(
                    drift < self.args.sample.max_timestamp_drift_secs,
                    format!("update timestamps for '{path}' out of interval"),
                )?;
            }
        }
        ctx.check(
            per_path.len() == self.args.update_paths_count,
            format!(
                "expected {} update paths, got {}",
                self.args.update_paths_count,
                per_path.len()
            ),
        )
    }
}
