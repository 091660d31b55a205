//! Declarative test profile: the YAML document describing a validation run
//!
//! A profile names the target, optional initial configurations to push, and
//! the ordered list of tests to run. Test arguments are kept as free-form
//! JSON maps here; each test class binds and validates them when the run is
//! built.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for profile loading
pub type ContextResult<T> = Result<T, ContextError>;

/// Errors that can occur while loading a test profile
#[derive(Debug, Error)]
pub enum ContextError {
    /// Failed to read a file
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML
    #[error("failed to parse YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// A full test profile parsed from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestContext {
    /// Human-readable description of the run, copied into the report.
    #[serde(default)]
    pub description: String,

    /// Free-form labels, copied into the report.
    #[serde(default)]
    pub labels: Vec<String>,

    /// Connection details for the device under test.
    #[serde(default)]
    pub target: Option<TargetConfig>,

    /// Configurations to push before any test runs.
    #[serde(default)]
    pub init_configs: Vec<InitConfig>,

    /// Tests to run, in declaration order.
    #[serde(default)]
    pub tests: Vec<TestEntry>,
}

/// One test to run: a display name, the test class, and its arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestEntry {
    pub name: String,
    pub class_name: String,
    #[serde(default)]
    pub args: serde_json::Map<String, serde_json::Value>,
}

/// An initial configuration: a JSON file to push at the given path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitConfig {
    pub filename: String,
    pub xpath: String,
}

/// Connection details for the device under test.
///
/// Credential and TLS fields are carried for the transport layer; only
/// `target` and `set_cooldown_secs` are consumed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Address as `hostname:port`.
    pub target: String,

    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub root_ca_cert: String,
    #[serde(default)]
    pub cert_chain: String,
    #[serde(default)]
    pub no_tls: bool,
    #[serde(default)]
    pub tls_host_override: String,

    /// Seconds to wait after each Set before issuing further operations.
    #[serde(default = "default_set_cooldown_secs", alias = "gnmi_set_cooldown_secs")]
    pub set_cooldown_secs: u64,
}

fn default_set_cooldown_secs() -> u64 {
    10
}

impl TestContext {
    /// Load a test profile from a YAML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> ContextResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ContextError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ContextError::ParseYaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PROFILE: &str = "\
description: Interface config checks
labels:
  - smoke
target:
  target: device:9339
  username: admin
  no_tls: true
init_configs:
  - filename: init.json
    xpath: /
tests:
  - name: Hostname is set
    class_name: get.GetCompare
    args:
      xpath: /system/state/hostname
      want: switch1
  - name: Interfaces respond
    class_name: get.Get
    args:
      xpath: /interfaces
";

    #[test]
    fn test_parse_profile() {
        let ctx: TestContext = serde_yaml::from_str(PROFILE).unwrap();
        assert_eq!(ctx.description, "Interface config checks");
        assert_eq!(ctx.labels, vec!["smoke"]);
        assert_eq!(ctx.init_configs.len(), 1);
        assert_eq!(ctx.init_configs[0].xpath, "/");
        assert_eq!(ctx.tests.len(), 2);
        assert_eq!(ctx.tests[0].class_name, "get.GetCompare");
        assert_eq!(
            ctx.tests[0].args.get("want"),
            Some(&serde_json::Value::String("switch1".to_string()))
        );
    }

    #[test]
    fn test_target_defaults() {
        let ctx: TestContext = serde_yaml::from_str(PROFILE).unwrap();
        let target = ctx.target.unwrap();
        assert_eq!(target.target, "device:9339");
        assert!(target.no_tls);
        assert_eq!(target.set_cooldown_secs, 10);
    }

    #[test]
    fn test_cooldown_legacy_field_name() {
        let yaml = "\
target:
  target: device:9339
  gnmi_set_cooldown_secs: 3
";
        let ctx: TestContext = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(ctx.target.unwrap().set_cooldown_secs, 3);
    }

    #[test]
    fn test_empty_sections_default() {
        let ctx: TestContext = serde_yaml::from_str("description: minimal").unwrap();
        assert!(ctx.labels.is_empty());
        assert!(ctx.init_configs.is_empty());
        assert!(ctx.tests.is_empty());
        assert!(ctx.target.is_none());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PROFILE.as_bytes()).unwrap();
        let ctx = TestContext::from_file(file.path()).unwrap();
        assert_eq!(ctx.tests.len(), 2);
    }

    #[test]
    fn test_from_file_missing() {
        let err = TestContext::from_file("/nonexistent/profile.yaml").unwrap_err();
        assert!(matches!(err, ContextError::ReadFile { .. }));
    }

    #[test]
    fn test_from_file_malformed_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"tests: [unclosed").unwrap();
        let err = TestContext::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ContextError::ParseYaml { .. }));
    }
}
