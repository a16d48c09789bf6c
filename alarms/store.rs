//! Alarm records and the mutex-guarded store.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier assigned to every alarm.
pub type AlarmId = Uuid;

/// Errors surfaced by alarm operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlarmError {
    /// An alarm with the requested name already exists.
    #[error("an alarm named '{0}' already exists")]
    DuplicateName(String),
    /// The requested alarm does not exist.
    #[error("no alarm with id {0}")]
    NotFound(AlarmId),
}

/// A named, time-triggered one-shot notification.
///
/// Values handed out by [`AlarmStore`] are owned snapshots; mutating a
/// snapshot never affects store state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alarm {
    /// Unique identifier, stable for the alarm's lifetime.
    pub id: AlarmId,
    /// Name, unique among stored alarms at creation time.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Universal time at which the alarm fires. Immutable after creation.
    pub trigger_time: DateTime<Utc>,
    /// Whether the monitor has already fired this alarm.
    pub triggered: bool,
    #[serde(skip)]
    seq: u64,
}

impl Alarm {
    /// Time remaining until the trigger point (negative once past).
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.trigger_time - now
    }

    /// Whether the alarm is past due and still unfired.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.triggered && self.trigger_time <= now
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    alarms: IndexMap<AlarmId, Alarm>,
    names: IndexMap<String, AlarmId>,
    next_seq: u64,
}

/// Thread-safe alarm store shared between the monitor task and command handlers.
///
/// One mutex guards all operations; the monitor's sweep and the command
/// path interleave safely at alarm granularity.
#[derive(Debug, Default, Clone)]
pub struct AlarmStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl AlarmStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new alarm, rejecting duplicate names among stored alarms.
    pub fn add(
        &self,
        name: impl Into<String>,
        trigger_time: DateTime<Utc>,
        description: impl Into<String>,
    ) -> Result<Alarm, AlarmError> {
        let name = name.into();
        let mut inner = self.inner.lock();
        if inner.names.contains_key(&name) {
            return Err(AlarmError::DuplicateName(name));
        }
        let alarm = Alarm {
            id: Uuid::new_v4(),
            name: name.clone(),
            description: description.into(),
            trigger_time,
            triggered: false,
            seq: inner.next_seq,
        };
        inner.next_seq += 1;
        inner.names.insert(name, alarm.id);
        inner.alarms.insert(alarm.id, alarm.clone());
        Ok(alarm)
    }

    /// Snapshot of all alarms, trigger time ascending, ties by creation order.
    #[must_use]
    pub fn list(&self) -> Vec<Alarm> {
        let inner = self.inner.lock();
        let mut alarms: Vec<Alarm> = inner.alarms.values().cloned().collect();
        alarms.sort_by(|a, b| {
            a.trigger_time
                .cmp(&b.trigger_time)
                .then_with(|| a.seq.cmp(&b.seq))
        });
        alarms
    }

    /// Untriggered alarms whose trigger time has been reached, in list order.
    #[must_use]
    pub fn due(&self, now: DateTime<Utc>) -> Vec<Alarm> {
        self.list().into_iter().filter(|a| a.is_due(now)).collect()
    }

    /// Fetches a single alarm snapshot.
    pub fn get(&self, id: AlarmId) -> Result<Alarm, AlarmError> {
        self.inner
            .lock()
            .alarms
            .get(&id)
            .cloned()
            .ok_or(AlarmError::NotFound(id))
    }

    /// Removes an alarm; unknown ids are a no-op so removal sweeps stay idempotent.
    pub fn remove(&self, id: AlarmId) {
        let mut inner = self.inner.lock();
        if let Some(alarm) = inner.alarms.shift_remove(&id) {
            inner.names.shift_remove(&alarm.name);
        }
    }

    /// Removes every alarm. Expired alarms survive quick-save reloads in the
    /// simulation, so startup clears them manually.
    pub fn remove_all(&self) {
        let mut inner = self.inner.lock();
        inner.alarms.clear();
        inner.names.clear();
    }

    /// Marks an alarm as fired, exactly once. Never un-triggers.
    pub fn mark_triggered(&self, id: AlarmId) -> Result<Alarm, AlarmError> {
        let mut inner = self.inner.lock();
        let alarm = inner.alarms.get_mut(&id).ok_or(AlarmError::NotFound(id))?;
        alarm.triggered = true;
        Ok(alarm.clone())
    }

    /// Number of stored alarms, triggered ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().alarms.len()
    }

    /// Whether the store holds no alarms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().alarms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1951, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    #[test]
    fn rejects_duplicate_names() {
        let store = AlarmStore::new();
        store.add("X", at(60), "first").unwrap();
        let err = store.add("X", at(120), "second").unwrap_err();
        assert_eq!(err, AlarmError::DuplicateName("X".into()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.list()[0].description, "first");
    }

    #[test]
    fn removal_frees_the_name() {
        let store = AlarmStore::new();
        let alarm = store.add("X", at(60), "").unwrap();
        store.remove(alarm.id);
        assert!(store.add("X", at(90), "").is_ok());
    }

    #[test]
    fn remove_is_idempotent() {
        let store = AlarmStore::new();
        let alarm = store.add("X", at(60), "").unwrap();
        store.remove(alarm.id);
        store.remove(alarm.id);
        assert!(store.is_empty());
    }

    #[test]
    fn list_orders_by_trigger_time_then_creation() {
        let store = AlarmStore::new();
        store.add("late", at(120), "").unwrap();
        store.add("early-a", at(60), "").unwrap();
        store.add("early-b", at(60), "").unwrap();
        let names: Vec<_> = store.list().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["early-a", "early-b", "late"]);
    }

    #[test]
    fn mark_triggered_requires_known_id() {
        let store = AlarmStore::new();
        let err = store.mark_triggered(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AlarmError::NotFound(_)));
    }

    #[test]
    fn snapshots_do_not_leak_mutations() {
        let store = AlarmStore::new();
        let mut snapshot = store.add("X", at(60), "").unwrap();
        snapshot.name = "tampered".into();
        snapshot.triggered = true;
        let stored = store.get(snapshot.id).unwrap();
        assert_eq!(stored.name, "X");
        assert!(!stored.triggered);
    }

    #[test]
    fn due_excludes_triggered_and_future() {
        let store = AlarmStore::new();
        let past = store.add("past", at(10), "").unwrap();
        store.add("future", at(100), "").unwrap();
        assert_eq!(store.due(at(50)).len(), 1);
        store.mark_triggered(past.id).unwrap();
        assert!(store.due(at(50)).is_empty());
    }
}
