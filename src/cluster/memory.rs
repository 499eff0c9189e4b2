// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-process [`ClusterClient`] used by unit and integration tests.
//!
//! `InMemoryCluster` keeps objects in a map and mimics the API server behaviour the
//! engine depends on:
//!
//! - `metadata.resourceVersion` is bumped on every write and checked on update
//! - `metadata.generation` starts at 1 and increments only when `spec` changes
//! - `update` never touches `status`; `update_status` touches nothing else
//! - `metadata.uid` is assigned on create
//!
//! Tests can inject failures per operation and kind, register a defaulter that
//! simulates server-populated fields (e.g. `spec.clusterIP`), and inspect the log of
//! writes to assert that a reconcile was a no-op.

use super::{ClusterClient, ObjectKey, TypeKey, TypeRegistry};
use crate::errors::ClusterError;
use async_trait::async_trait;
use kube::core::DynamicObject;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Cluster operation, used to target injected failures and to label the write log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// `get`
    Get,
    /// `list`
    List,
    /// `create`
    Create,
    /// `update`
    Update,
    /// `update_status`
    UpdateStatus,
    /// `delete`
    Delete,
}

impl Operation {
    fn is_write(self) -> bool {
        !matches!(self, Self::Get | Self::List)
    }
}

/// One mutating call recorded by the cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteRecord {
    /// Operation performed
    pub operation: Operation,
    /// Object written
    pub key: ObjectKey,
}

/// Hook that fills in server-populated fields of newly created objects.
pub type Defaulter = Arc<dyn Fn(&mut DynamicObject) + Send + Sync>;

struct InjectedFailure {
    operation: Operation,
    kind: String,
    error: ClusterError,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, DynamicObject>,
    next_version: u64,
    next_uid: u64,
    failures: VecDeque<InjectedFailure>,
    writes: Vec<WriteRecord>,
    defaulter: Option<Defaulter>,
}

impl State {
    fn bump_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    /// Pop the first injected failure matching `operation` on `kind`.
    fn take_failure(&mut self, operation: Operation, kind: &str) -> Option<ClusterError> {
        let index = self
            .failures
            .iter()
            .position(|f| f.operation == operation && f.kind == kind)?;
        self.failures.remove(index).map(|f| f.error)
    }

    fn check(&mut self, operation: Operation, key: &ObjectKey) -> Result<(), ClusterError> {
        if let Some(error) = self.take_failure(operation, &key.type_key.kind) {
            return Err(error);
        }
        if operation.is_write() {
            self.writes.push(WriteRecord {
                operation,
                key: key.clone(),
            });
        }
        Ok(())
    }

    fn insert_new(&mut self, key: ObjectKey, mut object: DynamicObject) -> DynamicObject {
        self.next_uid += 1;
        object.metadata.uid = Some(format!("uid-{}", self.next_uid));
        object.metadata.resource_version = Some(self.bump_version());
        object.metadata.generation = Some(1);
        object.metadata.namespace = Some(key.namespace.clone());
        if let Some(defaulter) = &self.defaulter {
            defaulter(&mut object);
        }
        self.objects.insert(key, object.clone());
        object
    }
}

/// Object store that behaves like a single API server.
#[derive(Default)]
pub struct InMemoryCluster {
    state: Mutex<State>,
}

impl InMemoryCluster {
    /// Create an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panicking test must not poison the remaining assertions
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Install a hook run on every created object.
    pub fn set_defaulter(&self, defaulter: impl Fn(&mut DynamicObject) + Send + Sync + 'static) {
        self.state().defaulter = Some(Arc::new(defaulter));
    }

    /// Fail the next `operation` on objects of `kind` with `error`.
    ///
    /// Failures queue up: injecting twice fails the next two matching calls.
    pub fn inject_failure(&self, operation: Operation, kind: &str, error: ClusterError) {
        self.state().failures.push_back(InjectedFailure {
            operation,
            kind: kind.to_string(),
            error,
        });
    }

    /// Store a typed object as if it had been created by someone else.
    ///
    /// Seeding is not recorded in the write log.
    ///
    /// # Errors
    ///
    /// Returns an error when the type is not registered or the object has no
    /// name/namespace.
    pub fn seed<K>(
        &self,
        registry: &TypeRegistry,
        object: &K,
    ) -> Result<DynamicObject, ClusterError>
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let dynamic = registry.encode(object)?;
        let key = ObjectKey::from_object(&dynamic)?;
        Ok(self.state().insert_new(key, dynamic))
    }

    /// Read a typed object directly, bypassing injected failures.
    #[must_use]
    pub fn fetch<K>(&self, registry: &TypeRegistry, namespace: &str, name: &str) -> Option<K>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let key = ObjectKey::of::<K>(namespace, name);
        let object = self.state().objects.get(&key).cloned()?;
        registry.decode(object).ok()
    }

    /// Modify a stored object in place as an external actor would.
    ///
    /// Bumps `resourceVersion`; returns `false` when the object does not exist.
    pub fn mutate(&self, key: &ObjectKey, change: impl FnOnce(&mut DynamicObject)) -> bool {
        let mut state = self.state();
        let version = state.bump_version();
        match state.objects.get_mut(key) {
            Some(object) => {
                change(object);
                object.metadata.resource_version = Some(version);
                true
            }
            None => false,
        }
    }

    /// Remove an object without recording a write.
    pub fn remove(&self, key: &ObjectKey) -> Option<DynamicObject> {
        self.state().objects.remove(key)
    }

    /// Whether an object exists.
    #[must_use]
    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.state().objects.contains_key(key)
    }

    /// Keys of all stored objects of a type.
    #[must_use]
    pub fn keys_of(&self, type_key: &TypeKey) -> Vec<ObjectKey> {
        self.state()
            .objects
            .keys()
            .filter(|k| &k.type_key == type_key)
            .cloned()
            .collect()
    }

    /// Mutating calls recorded so far.
    #[must_use]
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state().writes.clone()
    }

    /// Forget recorded writes.
    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>, ClusterError> {
        let mut state = self.state();
        state.check(Operation::Get, key)?;
        Ok(state.objects.get(key).cloned())
    }

    async fn list(
        &self,
        type_key: &TypeKey,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<DynamicObject>, ClusterError> {
        let mut state = self.state();
        if let Some(error) = state.take_failure(Operation::List, &type_key.kind) {
            return Err(error);
        }

        let selector = parse_selector(label_selector);
        Ok(state
            .objects
            .iter()
            .filter(|(k, _)| &k.type_key == type_key && k.namespace == namespace)
            .filter(|(_, o)| matches_selector(o, &selector))
            .map(|(_, o)| o.clone())
            .collect())
    }

    async fn create(&self, object: &DynamicObject) -> Result<DynamicObject, ClusterError> {
        let key = ObjectKey::from_object(object)?;
        let mut state = self.state();
        state.check(Operation::Create, &key)?;
        if state.objects.contains_key(&key) {
            return Err(ClusterError::AlreadyExists {
                key: key.to_string(),
            });
        }

        let mut object = object.clone();
        set_status(&mut object, None);
        Ok(state.insert_new(key, object))
    }

    async fn update(&self, object: &DynamicObject) -> Result<DynamicObject, ClusterError> {
        let key = ObjectKey::from_object(object)?;
        let mut state = self.state();
        state.check(Operation::Update, &key)?;
        let current = state
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound {
                key: key.to_string(),
            })?;
        check_version(&key, object, &current)?;

        let mut updated = object.clone();
        set_status(&mut updated, current.data.get("status").cloned());
        updated.metadata.uid = current.metadata.uid.clone();
        updated.metadata.generation = if updated.data.get("spec") == current.data.get("spec") {
            current.metadata.generation
        } else {
            current.metadata.generation.map(|g| g + 1)
        };
        updated.metadata.resource_version = Some(state.bump_version());
        state.objects.insert(key, updated.clone());
        Ok(updated)
    }

    async fn update_status(
        &self,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClusterError> {
        let key = ObjectKey::from_object(object)?;
        let mut state = self.state();
        state.check(Operation::UpdateStatus, &key)?;
        let mut updated = state
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound {
                key: key.to_string(),
            })?;
        check_version(&key, object, &updated)?;

        set_status(&mut updated, object.data.get("status").cloned());
        updated.metadata.resource_version = Some(state.bump_version());
        state.objects.insert(key, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), ClusterError> {
        let mut state = self.state();
        state.check(Operation::Delete, key)?;
        state.objects.remove(key);
        Ok(())
    }
}

fn check_version(
    key: &ObjectKey,
    incoming: &DynamicObject,
    current: &DynamicObject,
) -> Result<(), ClusterError> {
    match &incoming.metadata.resource_version {
        Some(version) if Some(version) != current.metadata.resource_version.as_ref() => {
            Err(ClusterError::Conflict {
                key: key.to_string(),
            })
        }
        _ => Ok(()),
    }
}

fn set_status(object: &mut DynamicObject, status: Option<serde_json::Value>) {
    if let Some(data) = object.data.as_object_mut() {
        match status {
            Some(status) => {
                data.insert("status".to_string(), status);
            }
            None => {
                data.remove("status");
            }
        }
    }
}

fn parse_selector(selector: &str) -> Vec<(String, String)> {
    selector
        .split(',')
        .filter_map(|term| term.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

fn matches_selector(object: &DynamicObject, selector: &[(String, String)]) -> bool {
    let labels = object.metadata.labels.as_ref();
    selector
        .iter()
        .all(|(k, v)| labels.and_then(|l| l.get(k)) == Some(v))
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
