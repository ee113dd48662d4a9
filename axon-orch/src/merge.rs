//! Folding multi-handler output states into one.

use crate::config::{KeyMergePolicy, StateMergePolicy};
use axon_core::SharedState;
use std::collections::HashMap;

/// Fold `outputs` (in registration order) into `base` under `policy`.
///
/// Metadata always folds last-wins regardless of policy — key policies
/// apply to the data map only.
pub(crate) fn fold_outputs(
    policy: &StateMergePolicy,
    base: &SharedState,
    outputs: Vec<SharedState>,
) -> SharedState {
    match policy {
        StateMergePolicy::Overwrite => outputs
            .into_iter()
            .next()
            .unwrap_or_else(|| base.clone()),
        StateMergePolicy::Merge => {
            let merged = base.clone();
            for output in &outputs {
                merged.merge(output);
            }
            merged
        }
        StateMergePolicy::ByKeyPolicy(policies) => fold_by_key(policies, base, outputs),
    }
}

fn fold_by_key(
    policies: &HashMap<String, KeyMergePolicy>,
    base: &SharedState,
    outputs: Vec<SharedState>,
) -> SharedState {
    let merged = base.clone();
    for output in &outputs {
        let snapshot = output.snapshot();
        for (key, value) in snapshot.data {
            let policy = policies.get(&key).copied().unwrap_or(KeyMergePolicy::LastWins);
            apply_key(&merged, policy, &key, value);
        }
        for (key, value) in snapshot.meta {
            merged.set_meta(key, value);
        }
    }
    merged
}

fn apply_key(state: &SharedState, policy: KeyMergePolicy, key: &str, value: serde_json::Value) {
    match policy {
        KeyMergePolicy::LastWins => state.set(key, value),
        KeyMergePolicy::FirstWins => {
            if state.get(key).is_none() {
                state.set(key, value);
            }
        }
        KeyMergePolicy::AppendToList => {
            let list = match state.get(key) {
                Some(serde_json::Value::Array(mut items)) => {
                    items.push(value);
                    items
                }
                Some(existing) => vec![existing, value],
                None => vec![value],
            };
            state.set(key, serde_json::Value::Array(list));
        }
        KeyMergePolicy::SumNumeric => {
            let summed = match state.get(key) {
                Some(existing) => sum_numeric(&existing, &value),
                None => Some(value.clone()),
            };
            state.set(key, summed.unwrap_or(value));
        }
    }
}

/// Sum two JSON numbers, staying integral when both sides are. `None`
/// when either side is non-numeric (caller falls back to last-wins).
fn sum_numeric(a: &serde_json::Value, b: &serde_json::Value) -> Option<serde_json::Value> {
    let (a, b) = (a.as_number()?, b.as_number()?);
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return Some(serde_json::Value::from(x + y));
    }
    let sum = a.as_f64()? + b.as_f64()?;
    serde_json::Number::from_f64(sum).map(serde_json::Value::Number)
}
