// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Semantic comparison of desired and live dependents.
//!
//! Live objects are full of fields the operator never set: defaults filled in by the
//! API server (`spec.clusterIP`, `terminationMessagePath`, ...), metadata owned by
//! other controllers, `status`. A byte comparison would always report a difference
//! and the engine would update on every pass.
//!
//! The rule is therefore "desired is a subset of live":
//!
//! - objects: every key of desired must match in live; extra live keys are ignored
//! - arrays: same length, element-wise subset
//! - a key missing in live matches an empty desired value (`null`, `""`, `[]`, `{}`)
//! - scalars: equal
//!
//! Updates merge desired onto live so that server-populated fields survive.
//! Arrays are replaced wholesale; merging them element-wise could combine
//! unrelated entries.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::core::{DynamicObject, ObjectMeta};
use serde_json::Value;
use std::collections::BTreeMap;

/// Whether `desired` is semantically contained in `live`.
#[must_use]
pub fn is_subset(desired: &Value, live: &Value) -> bool {
    match (desired, live) {
        (Value::Object(desired), Value::Object(live)) => desired.iter().all(|(key, value)| {
            live.get(key)
                .map_or_else(|| is_empty(value), |live_value| is_subset(value, live_value))
        }),
        (Value::Array(desired), Value::Array(live)) => {
            desired.len() == live.len()
                && desired.iter().zip(live).all(|(d, l)| is_subset(d, l))
        }
        (desired, Value::Null) => is_empty(desired),
        (desired, live) => desired == live,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.values().all(is_empty),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Whether the live object differs from the desired one in a way that needs an update.
///
/// Compares labels, annotations and every top-level field except `status`.
#[must_use]
pub fn needs_update(desired: &DynamicObject, live: &DynamicObject) -> bool {
    !(map_subset(desired.metadata.labels.as_ref(), live.metadata.labels.as_ref())
        && map_subset(
            desired.metadata.annotations.as_ref(),
            live.metadata.annotations.as_ref(),
        )
        && is_subset(&without_status(&desired.data), &live.data))
}

/// Merge desired onto live, producing the object to send as an update.
///
/// The result keeps live's `resourceVersion`, so a concurrent change surfaces as a
/// conflict instead of being overwritten.
#[must_use]
pub fn merge_onto_live(desired: &DynamicObject, live: &DynamicObject) -> DynamicObject {
    let mut merged = live.clone();
    merged.metadata.labels = merge_maps(
        live.metadata.labels.as_ref(),
        desired.metadata.labels.as_ref(),
    );
    merged.metadata.annotations = merge_maps(
        live.metadata.annotations.as_ref(),
        desired.metadata.annotations.as_ref(),
    );
    merge_values(&mut merged.data, &without_status(&desired.data));
    merged
}

/// Controller owner reference of an object, if any.
#[must_use]
pub fn controller_owner(metadata: &ObjectMeta) -> Option<&OwnerReference> {
    metadata
        .owner_references
        .as_ref()?
        .iter()
        .find(|r| r.controller == Some(true))
}

/// Whether `object` is controlled by the owner with `owner_uid`.
#[must_use]
pub fn is_owned_by(object: &DynamicObject, owner_uid: &str) -> bool {
    controller_owner(&object.metadata).is_some_and(|r| !owner_uid.is_empty() && r.uid == owner_uid)
}

fn merge_values(target: &mut Value, desired: &Value) {
    match (target, desired) {
        (Value::Object(target), Value::Object(desired)) => {
            for (key, value) in desired {
                match target.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_values(existing, value);
                    }
                    _ => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, desired) => *target = desired.clone(),
    }
}

fn without_status(data: &Value) -> Value {
    let mut data = data.clone();
    if let Some(object) = data.as_object_mut() {
        object.remove("status");
    }
    data
}

fn map_subset(
    desired: Option<&BTreeMap<String, String>>,
    live: Option<&BTreeMap<String, String>>,
) -> bool {
    desired.into_iter().flatten().all(|(key, value)| {
        live.and_then(|l| l.get(key))
            .map_or(value.is_empty(), |live_value| live_value == value)
    })
}

fn merge_maps(
    live: Option<&BTreeMap<String, String>>,
    desired: Option<&BTreeMap<String, String>>,
) -> Option<BTreeMap<String, String>> {
    if live.is_none() && desired.is_none() {
        return None;
    }
    let mut merged = live.cloned().unwrap_or_default();
    if let Some(desired) = desired {
        merged.extend(desired.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    Some(merged)
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod diff_tests;
