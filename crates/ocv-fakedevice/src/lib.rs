//! In-memory device session
//!
//! Holds a flat store of values keyed by canonical path and answers the
//! whole session interface from it. Set operations can be mirrored from
//! `config` containers into their `state` twins, faults can be injected
//! per path, and every operation is recorded with start and end times so
//! tests can assert ordering. Not a protocol implementation.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use ocv_path::Path;
use ocv_session::{
    DeviceSession, Notification, OnChangeResponse, SessionError, SyncHook, Update,
};
use ocv_value::TypedValue;

/// One recorded session operation. Offsets are nanoseconds since the
/// device was created.
#[derive(Debug, Clone)]
pub struct OpRecord {
    pub op: &'static str,
    pub path: String,
    pub started_nanos: u128,
    pub ended_nanos: u128,
}

struct WatchState {
    pattern: Path,
    changes: Vec<Update>,
}

/// An in-memory stand-in for a live device session.
///
/// Get answers only paths that hold a value; the fake does not assemble
/// container documents out of stored leaves.
pub struct FakeDevice {
    store: DashMap<String, Update>,
    failed_paths: DashMap<String, ()>,
    queued_changes: Mutex<Vec<Update>>,
    watch: Mutex<Option<WatchState>>,
    ops: Mutex<Vec<OpRecord>>,
    epoch: Instant,
    latency: Option<Duration>,
    reflect_state: bool,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
            failed_paths: DashMap::new(),
            queued_changes: Mutex::new(Vec::new()),
            watch: Mutex::new(None),
            ops: Mutex::new(Vec::new()),
            epoch: Instant::now(),
            latency: None,
            reflect_state: false,
        }
    }

    /// Seed a value before handing the device to a test.
    pub fn with_leaf(self, path: Path, value: TypedValue) -> Self {
        self.store
            .insert(path.to_string(), Update::new(path, value));
        self
    }

    /// Delay every operation by `latency`, holding the recorded span open
    /// for at least that long.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Mirror writes under `.../config` into the sibling `.../state`
    /// container, the way a convergent device would.
    pub fn with_state_reflection(mut self) -> Self {
        self.reflect_state = true;
        self
    }

    /// Make every operation touching `path` fail.
    pub fn fail_at(&self, path: &Path) {
        self.failed_paths.insert(path.to_string(), ());
    }

    /// Queue a device-side change, delivered (and applied) after the sync
    /// marker of the next on-change subscription.
    pub fn queue_change(&self, path: Path, value: TypedValue) {
        self.queued_mut().push(Update::new(path, value));
    }

    /// Inspect the stored value at a path, if any.
    pub fn value_at(&self, path: &Path) -> Option<TypedValue> {
        self.store
            .get(&path.to_string())
            .map(|entry| entry.value.clone())
    }

    /// All operations performed so far, in completion order.
    pub fn op_log(&self) -> Vec<OpRecord> {
        self.ops_mut().clone()
    }

    fn queued_mut(&self) -> MutexGuard<'_, Vec<Update>> {
        self.queued_changes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn watch_mut(&self) -> MutexGuard<'_, Option<WatchState>> {
        self.watch.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ops_mut(&self) -> MutexGuard<'_, Vec<OpRecord>> {
        self.ops.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn elapsed_nanos(&self) -> u128 {
        self.epoch.elapsed().as_nanos()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn record_op(&self, op: &'static str, path: String, started_nanos: u128) {
        self.ops_mut().push(OpRecord {
            op,
            path,
            started_nanos,
            ended_nanos: self.elapsed_nanos(),
        });
    }

    fn check_fault(&self, path: &Path) -> Result<(), SessionError> {
        if self.failed_paths.contains_key(&path.to_string()) {
            return Err(SessionError::Rpc(format!("injected fault at {path}")));
        }
        Ok(())
    }

    fn perform_update(&self, path: &Path, value: TypedValue) {
        let key = path.to_string();
        let existing = self.store.get(&key).map(|entry| entry.value.clone());
        let merged = match existing {
            Some(old) => merge_values(&old, &value),
            None => value,
        };
        self.store
            .insert(key, Update::new(path.clone(), merged.clone()));
        self.notice_change(path, &merged);
        if self.reflect_state {
            if let Some(twin) = state_twin(path) {
                self.store
                    .insert(twin.to_string(), Update::new(twin.clone(), merged.clone()));
                self.notice_change(&twin, &merged);
            }
        }
    }

    fn perform_replace(&self, path: &Path, value: TypedValue) {
        self.store
            .insert(path.to_string(), Update::new(path.clone(), value.clone()));
        self.notice_change(path, &value);
        if self.reflect_state {
            if let Some(twin) = state_twin(path) {
                self.store
                    .insert(twin.to_string(), Update::new(twin.clone(), value.clone()));
                self.notice_change(&twin, &value);
            }
        }
    }

    fn perform_delete(&self, path: &Path) {
        self.remove_subtree(path);
        if self.reflect_state {
            if let Some(twin) = state_twin(path) {
                self.remove_subtree(&twin);
            }
        }
    }

    fn remove_subtree(&self, path: &Path) {
        if path.is_root() {
            self.store.clear();
            return;
        }
        let key = path.to_string();
        let prefix = format!("{key}/");
        self.store
            .retain(|stored, _| stored != &key && !stored.starts_with(&prefix));
    }

    fn notice_change(&self, path: &Path, value: &TypedValue) {
        let mut guard = self.watch_mut();
        if let Some(watch) = guard.as_mut() {
            if path.matches(&watch.pattern) {
                watch.changes.push(Update::new(path.clone(), value.clone()));
            }
        }
    }

    fn matching_updates(&self, patterns: &[Path]) -> Vec<Update> {
        let mut matched: Vec<Update> = self
            .store
            .iter()
            .filter(|entry| entry.value().path.matches_any(patterns))
            .map(|entry| entry.value().clone())
            .collect();
        matched.sort_by_key(|update| update.path.to_string());
        matched
    }

    fn snapshot_notification(&self, patterns: &[Path]) -> Vec<Notification> {
        let updates = self.matching_updates(patterns);
        if updates.is_empty() {
            return Vec::new();
        }
        vec![Notification {
            timestamp_nanos: now_nanos(),
            updates,
        }]
    }
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceSession for FakeDevice {
    async fn get(&self, path: &Path) -> Result<TypedValue, SessionError> {
        let started = self.elapsed_nanos();
        self.simulate_latency().await;
        let outcome = self.check_fault(path).and_then(|()| {
            self.value_at(path)
                .ok_or_else(|| SessionError::Rpc(format!("no value at {path}")))
        });
        self.record_op("get", path.to_string(), started);
        outcome
    }

    async fn set_update(&self, path: &Path, value: TypedValue) -> Result<(), SessionError> {
        let started = self.elapsed_nanos();
        self.simulate_latency().await;
        let outcome = self.check_fault(path).map(|()| {
            self.perform_update(path, value);
        });
        self.record_op("set_update", path.to_string(), started);
        outcome
    }

    async fn set_replace(&self, path: &Path, value: TypedValue) -> Result<(), SessionError> {
        let started = self.elapsed_nanos();
        self.simulate_latency().await;
        let outcome = self.check_fault(path).map(|()| {
            self.perform_replace(path, value);
        });
        self.record_op("set_replace", path.to_string(), started);
        outcome
    }

    async fn set_delete(&self, path: &Path) -> Result<(), SessionError> {
        let started = self.elapsed_nanos();
        self.simulate_latency().await;
        let outcome = self.check_fault(path).map(|()| {
            self.perform_delete(path);
        });
        self.record_op("set_delete", path.to_string(), started);
        outcome
    }

    async fn subscribe_once(&self, paths: &[Path]) -> Result<Vec<Notification>, SessionError> {
        let started = self.elapsed_nanos();
        self.simulate_latency().await;
        let mut outcome = Ok(self.snapshot_notification(paths));
        for path in paths {
            if let Err(err) = self.check_fault(path) {
                outcome = Err(err);
                break;
            }
        }
        let joined = paths
            .iter()
            .map(Path::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        self.record_op("subscribe_once", joined, started);
        outcome
    }

    async fn subscribe_sample(
        &self,
        path: &Path,
        interval_nanos: u64,
        timeout_secs: u64,
    ) -> Result<Vec<Notification>, SessionError> {
        let started = self.elapsed_nanos();
        self.simulate_latency().await;
        let outcome = self.check_fault(path).map(|()| {
            let updates = self.matching_updates(std::slice::from_ref(path));
            let count = if interval_nanos == 0 {
                1
            } else {
                timeout_secs * 1_000_000_000 / interval_nanos + 1
            };
            let base = now_nanos();
            (0..count)
                .map(|i| Notification {
                    timestamp_nanos: base + (i * interval_nanos) as i64,
                    updates: updates.clone(),
                })
                .collect()
        });
        self.record_op("subscribe_sample", path.to_string(), started);
        outcome
    }

    async fn subscribe_on_change(
        &self,
        path: &Path,
        _timeout_secs: u64,
        on_sync: Option<SyncHook>,
    ) -> Result<OnChangeResponse, SessionError> {
        let started = self.elapsed_nanos();
        self.simulate_latency().await;
        if let Err(err) = self.check_fault(path) {
            self.record_op("subscribe_on_change", path.to_string(), started);
            return Err(err);
        }

        let before_sync = self.snapshot_notification(std::slice::from_ref(path));
        *self.watch_mut() = Some(WatchState {
            pattern: path.clone(),
            changes: Vec::new(),
        });

        if let Some(hook) = on_sync {
            hook().await;
        }
        let queued: Vec<Update> = self.queued_mut().drain(..).collect();
        for change in queued {
            self.perform_update(&change.path, change.value);
        }

        let changes = self
            .watch_mut()
            .take()
            .map(|watch| watch.changes)
            .unwrap_or_default();
        let after_sync = changes
            .into_iter()
            .map(|update| Notification {
                timestamp_nanos: now_nanos(),
                updates: vec![update],
            })
            .collect();
        self.record_op("subscribe_on_change", path.to_string(), started);
        Ok(OnChangeResponse {
            before_sync,
            after_sync,
        })
    }
}

fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
}

/// Sibling `state` container of a path ending in `config`.
fn state_twin(path: &Path) -> Option<Path> {
    let text = path.to_string();
    let base = text.strip_suffix("/config")?;
    Path::parse(&format!("{base}/state")).ok()
}

fn merge_values(old: &TypedValue, new: &TypedValue) -> TypedValue {
    if let (TypedValue::Json(old_text), TypedValue::Json(new_text)) = (old, new) {
        if let (Ok(mut base), Ok(patch)) = (
            serde_json::from_str::<serde_json::Value>(old_text),
            serde_json::from_str::<serde_json::Value>(new_text),
        ) {
            if base.is_object() && patch.is_object() {
                merge_json(&mut base, &patch);
                return TypedValue::Json(base.to_string());
            }
        }
    }
    new.clone()
}

fn merge_json(base: &mut serde_json::Value, patch: &serde_json::Value) {
    match (base, patch) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match base_map.get_mut(key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, other) => *slot = other.clone(),
    }
}
