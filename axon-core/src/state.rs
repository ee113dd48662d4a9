//! Concurrent key/value state threaded through a dispatch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Serializable snapshot of a state's two maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StateSnapshot {
    /// Application data, arbitrary JSON values keyed by string.
    pub data: HashMap<String, serde_json::Value>,
    /// Routing/correlation metadata, string-to-string.
    pub meta: HashMap<String, String>,
}

/// Thread-safe mutable key/value store with a data map and a metadata map.
///
/// Both maps live behind a single mutex, so every operation is linearizable
/// against a total order on the instance. `Clone` is a *deep* copy: the
/// clone owns fresh maps and a fresh lock, and subsequent mutation of either
/// side cannot observably affect the other.
///
/// Setting a key to `Value::Null` stores the null — it is present-with-null,
/// not deletion. Deletion is not part of the public contract.
///
/// ```
/// use axon_core::SharedState;
/// use serde_json::json;
///
/// let state = SharedState::new();
/// state.set("counter", json!(1));
/// let copy = state.clone();
/// copy.set("counter", json!(2));
/// assert_eq!(state.get("counter"), Some(json!(1)));
/// ```
#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<StateSnapshot>,
}

impl SharedState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state from an existing snapshot.
    pub fn from_snapshot(snapshot: StateSnapshot) -> Self {
        Self {
            inner: Mutex::new(snapshot),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StateSnapshot> {
        // State operations are infallible; a poisoned lock still holds
        // structurally valid maps, so recover the guard and continue.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a data value (cloned).
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.lock().data.get(key).cloned()
    }

    /// Set a data value.
    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        self.lock().data.insert(key.into(), value);
    }

    /// All data keys. Iteration order is unspecified.
    pub fn keys(&self) -> Vec<String> {
        self.lock().data.keys().cloned().collect()
    }

    /// Get a metadata value.
    pub fn get_meta(&self, key: &str) -> Option<String> {
        self.lock().meta.get(key).cloned()
    }

    /// Set a metadata value.
    pub fn set_meta(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock().meta.insert(key.into(), value.into());
    }

    /// All metadata keys. Iteration order is unspecified.
    pub fn meta_keys(&self) -> Vec<String> {
        self.lock().meta.keys().cloned().collect()
    }

    /// Number of data entries.
    pub fn len(&self) -> usize {
        self.lock().data.len()
    }

    /// Whether the data map is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().data.is_empty()
    }

    /// Merge `other` into `self`; `other` overwrites on key conflict,
    /// for both the data and metadata maps.
    pub fn merge(&self, other: &SharedState) {
        // Snapshot other first so the two locks are never held together.
        let theirs = other.snapshot();
        let mut mine = self.lock();
        for (k, v) in theirs.data {
            mine.data.insert(k, v);
        }
        for (k, v) in theirs.meta {
            mine.meta.insert(k, v);
        }
    }

    /// Copy out both maps.
    pub fn snapshot(&self) -> StateSnapshot {
        self.lock().clone()
    }

    /// Serialize the current contents to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or(serde_json::Value::Null)
    }

    /// Reconstruct a state from a JSON value produced by [`to_json`](Self::to_json).
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let snapshot: StateSnapshot = serde_json::from_value(value)?;
        Ok(Self::from_snapshot(snapshot))
    }
}

impl Clone for SharedState {
    /// Deep copy: fresh maps, fresh lock. `serde_json::Value` owns its
    /// tree, so cloning the maps clones every nested list and object.
    fn clone(&self) -> Self {
        Self::from_snapshot(self.snapshot())
    }
}

impl From<StateSnapshot> for SharedState {
    fn from(snapshot: StateSnapshot) -> Self {
        Self::from_snapshot(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clone_is_independent_both_directions() {
        let original = SharedState::new();
        original.set("list", json!([1, 2]));
        original.set_meta("session_id", "s1");

        let copy = original.clone();
        copy.set("list", json!([1, 2, 3]));
        copy.set_meta("session_id", "s2");
        original.set("only_original", json!(true));

        assert_eq!(original.get("list"), Some(json!([1, 2])));
        assert_eq!(copy.get("list"), Some(json!([1, 2, 3])));
        assert_eq!(original.get_meta("session_id").as_deref(), Some("s1"));
        assert_eq!(copy.get_meta("session_id").as_deref(), Some("s2"));
        assert_eq!(copy.get("only_original"), None);
    }

    #[test]
    fn merge_overwrites_on_conflict() {
        let a = SharedState::new();
        a.set("shared", json!("a"));
        a.set("only_a", json!(1));
        let b = SharedState::new();
        b.set("shared", json!("b"));
        b.set("only_b", json!(2));
        b.set_meta("m", "b");

        a.merge(&b);
        assert_eq!(a.get("shared"), Some(json!("b")));
        assert_eq!(a.get("only_a"), Some(json!(1)));
        assert_eq!(a.get("only_b"), Some(json!(2)));
        assert_eq!(a.get_meta("m").as_deref(), Some("b"));
    }

    #[test]
    fn merge_of_disjoint_clones_is_semantically_identity() {
        let state = SharedState::new();
        state.set("x", json!(1));
        state.set("y", json!({"k": "v"}));

        let merged = state.clone();
        merged.merge(&state.clone());
        assert_eq!(merged.snapshot(), state.snapshot());
    }

    #[test]
    fn null_is_present_not_deleted() {
        let state = SharedState::new();
        state.set("k", json!(null));
        assert_eq!(state.get("k"), Some(json!(null)));
        assert!(state.keys().contains(&"k".to_string()));
    }

    #[test]
    fn json_round_trip() {
        let state = SharedState::new();
        state.set("x", json!([1, "two", {"three": 3}]));
        state.set_meta("route_to", "echo");

        let restored = SharedState::from_json(state.to_json()).unwrap();
        assert_eq!(restored.snapshot(), state.snapshot());
    }

    #[test]
    fn concurrent_sets_all_land() {
        use std::sync::Arc;
        let state = Arc::new(SharedState::new());
        let mut handles = vec![];
        for i in 0..8 {
            let state = Arc::clone(&state);
            handles.push(std::thread::spawn(move || {
                for j in 0..100 {
                    state.set(format!("k{i}-{j}"), json!(j));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(state.len(), 800);
    }
}
