//! Closed catalog of test classes
//!
//! Class names come from profile entries as `family.Class`. Resolution is a
//! compile-time match, so a typo in a profile surfaces as a load failure
//! instead of a reflection miss at run time.

use ocv_context::TestEntry;
use ocv_testbase::{CommonArgs, RetryPolicy, TestCase, TestSuite};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Error type for suite construction
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unknown test class '{0}'")]
    UnknownClass(String),

    #[error("bad arguments for '{class}': {detail}")]
    BadArgs { class: String, detail: String },
}

/// Builds a class's cases from a profile entry.
pub type SuiteBuilder =
    fn(&TestEntry, Option<RetryPolicy>) -> Result<Vec<Box<dyn TestCase>>, BuildError>;

/// Look up the builder for a class name.
pub fn resolve(class_name: &str) -> Option<SuiteBuilder> {
    Some(match class_name {
        "get.Get" => crate::get::build_get,
        "get.GetCompare" => crate::get::build_get_compare,
        "get.GetJsonCheck" => crate::get::build_get_json_check,
        "get.GetJsonCheckCompare" => crate::get::build_get_json_check_compare,
        "set.SetUpdate" => crate::set::build_set_update,
        "set.SetDelete" => crate::set::build_set_delete,
        "set.JsonCheckSetUpdate" => crate::set::build_json_check_set_update,
        "setget.SetGetJsonCheck" => crate::setget::build_set_get_json_check,
        "setget.SetGetJsonCheckCompare" => crate::setget::build_set_get_json_check_compare,
        "config_state.SetConfigCheckState" => crate::config_state::build_set_config_check_state,
        "config_state.DeleteConfigCheckState" => {
            crate::config_state::build_delete_config_check_state
        }
        "telemetry_once.CountUpdatesCheckType" => {
            crate::telemetry_once::build_count_updates_check_type
        }
        "telemetry_once.CheckStateLeafs" => crate::telemetry_once::build_check_state_leafs,
        "telemetry_sample.CountUpdates" => crate::telemetry_sample::build_count_updates,
        "telemetry_onchange.Subscribe" => crate::telemetry_onchange::build_subscribe,
        "telemetry_onchange.SubscribeAndSet" => crate::telemetry_onchange::build_subscribe_and_set,
        _ => return None,
    })
}

/// Build a whole suite from a profile entry.
///
/// Common arguments (failfast, retries) and the class's own are parsed from
/// the same map; the class builder rejects missing or ill-typed arguments.
pub fn build_suite(entry: &TestEntry) -> Result<TestSuite, BuildError> {
    let builder =
        resolve(&entry.class_name).ok_or_else(|| BuildError::UnknownClass(entry.class_name.clone()))?;
    let common = CommonArgs::from_args(&entry.args).map_err(|err| bad_args(entry, err))?;
    let cases = builder(entry, common.retry_policy())?;
    Ok(TestSuite::new(
        entry.name.clone(),
        entry.class_name.clone(),
        cases,
        common.failfast,
    ))
}

pub(crate) fn parse_args<T: DeserializeOwned>(entry: &TestEntry) -> Result<T, BuildError> {
    serde_json::from_value(serde_json::Value::Object(entry.args.clone()))
        .map_err(|err| bad_args(entry, err))
}

pub(crate) fn bad_args(entry: &TestEntry, detail: impl ToString) -> BuildError {
    BuildError::BadArgs {
        class: entry.class_name.clone(),
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(class_name: &str, args: serde_json::Value) -> TestEntry {
        TestEntry {
            name: "example".to_string(),
            class_name: class_name.to_string(),
            args: args.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_every_registered_class_resolves() {
        for class in [
            "get.Get",
            "get.GetCompare",
            "get.GetJsonCheck",
            "get.GetJsonCheckCompare",
            "set.SetUpdate",
            "set.SetDelete",
            "set.JsonCheckSetUpdate",
            "setget.SetGetJsonCheck",
            "setget.SetGetJsonCheckCompare",
            "config_state.SetConfigCheckState",
            "config_state.DeleteConfigCheckState",
            "telemetry_once.CountUpdatesCheckType",
            "telemetry_once.CheckStateLeafs",
            "telemetry_sample.CountUpdates",
            "telemetry_onchange.Subscribe",
            "telemetry_onchange.SubscribeAndSet",
        ] {
            assert!(resolve(class).is_some(), "no builder for {}", class);
        }
    }

    #[test]
    fn test_unknown_class() {
        let err = build_suite(&entry("get.Fetch", json!({}))).unwrap_err();
        assert!(matches!(err, BuildError::UnknownClass(name) if name == "get.Fetch"));
    }

    #[test]
    fn test_missing_argument_is_a_build_failure() {
        let err = build_suite(&entry("get.Get", json!({}))).unwrap_err();
        match err {
            BuildError::BadArgs { class, detail } => {
                assert_eq!(class, "get.Get");
                assert!(detail.contains("xpath"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_path_argument() {
        let err = build_suite(&entry("get.Get", json!({"xpath": "/x[default]"}))).unwrap_err();
        assert!(matches!(err, BuildError::BadArgs { .. }));
    }

    #[test]
    fn test_suite_carries_entry_identity_and_order() {
        let suite = build_suite(&entry(
            "config_state.SetConfigCheckState",
            json!({
                "xpath": "/system/ntp",
                "model": "system",
                "json_value": {"enabled": true},
            }),
        ))
        .unwrap();
        assert_eq!(suite.name, "example");
        assert_eq!(suite.class_name, "config_state.SetConfigCheckState");
        assert_eq!(suite.case_ids(), vec!["0100", "0200", "0300"]);
        assert!(!suite.failfast);
    }

    #[test]
    fn test_failfast_common_argument() {
        let suite = build_suite(&entry(
            "get.Get",
            json!({"xpath": "/system", "failfast": true}),
        ))
        .unwrap();
        assert!(suite.failfast);
    }
}
