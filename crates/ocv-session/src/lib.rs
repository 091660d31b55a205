//! Device Session Trait
//!
//! Defines the interface to a management-protocol session against a network
//! device. The implementation (a wire client over a secure channel) is
//! provided externally; tests use an in-memory fake.

use async_trait::async_trait;
use futures::future::BoxFuture;
use ocv_path::Path;
use ocv_value::TypedValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for protocol operations
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("unable to connect to target: {0}")]
    Connect(String),

    #[error("RPC failed: {0}")]
    Rpc(String),

    #[error("malformed response: {0}")]
    BadResponse(String),
}

/// A single path/value pair carried by a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub path: Path,
    pub value: TypedValue,
}

impl Update {
    pub fn new(path: Path, value: TypedValue) -> Self {
        Self { path, value }
    }
}

/// A timestamped batch of updates from the device.
///
/// The timestamp is nanoseconds since the Unix epoch, as reported by the
/// device clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub timestamp_nanos: i64,
    pub updates: Vec<Update>,
}

/// Notifications received around the initial-sync marker of an on-change
/// subscription: the initial state snapshot, then the changes.
#[derive(Debug, Default)]
pub struct OnChangeResponse {
    pub before_sync: Vec<Notification>,
    pub after_sync: Vec<Notification>,
}

/// Callback run once an on-change subscription has delivered its initial
/// state, typically to provoke the change being watched for.
pub type SyncHook = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Trait for a live session against a device
///
/// All operations address subtrees of the device datastore by structured
/// path. Subscription operations hold their stream open for at most the
/// given timeout and then return whatever accumulated; running into the
/// timeout is not an error.
#[async_trait]
pub trait DeviceSession: Send + Sync {
    /// Retrieve the value at a path.
    async fn get(&self, path: &Path) -> Result<TypedValue, SessionError>;

    /// Merge a value into the subtree at a path.
    async fn set_update(&self, path: &Path, value: TypedValue) -> Result<(), SessionError>;

    /// Replace the subtree at a path with a value.
    async fn set_replace(&self, path: &Path, value: TypedValue) -> Result<(), SessionError>;

    /// Delete the subtree at a path.
    async fn set_delete(&self, path: &Path) -> Result<(), SessionError>;

    /// Fetch a one-off snapshot of the subtrees under the given paths.
    async fn subscribe_once(&self, paths: &[Path]) -> Result<Vec<Notification>, SessionError>;

    /// Stream periodic samples of a path.
    ///
    /// The device samples the subtree every `interval_nanos` nanoseconds;
    /// the stream is held open for `timeout_secs` seconds.
    async fn subscribe_sample(
        &self,
        path: &Path,
        interval_nanos: u64,
        timeout_secs: u64,
    ) -> Result<Vec<Notification>, SessionError>;

    /// Watch a path for changes.
    ///
    /// Returns the initial state delivered before the sync marker and the
    /// change notifications received afterwards. When `on_sync` is given it
    /// runs exactly once, right after the sync marker.
    async fn subscribe_on_change(
        &self,
        path: &Path,
        timeout_secs: u64,
        on_sync: Option<SyncHook>,
    ) -> Result<OnChangeResponse, SessionError>;
}

/// Render notifications as a JSON array for protocol logs.
pub fn notifications_json(notifications: &[Notification]) -> String {
    serde_json::to_string(notifications).unwrap_or_else(|_| "[]".to_string())
}
