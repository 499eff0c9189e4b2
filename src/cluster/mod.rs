// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster API access for the reconciliation engine.
//!
//! The engine never talks to `kube::Api` directly. It goes through the
//! [`ClusterClient`] trait, which exposes typed CRUD keyed by
//! `(apiVersion, kind, namespace, name)` over [`DynamicObject`]s. Two implementations
//! ship with the crate:
//!
//! - [`KubeClusterClient`] - the real API server, every call bounded by a deadline
//! - [`InMemoryCluster`] - an in-process object store used by tests
//!
//! Conversion between typed objects (`Deployment`, `ManagedService`, ...) and their
//! dynamic form goes through a [`TypeRegistry`] that is passed in explicitly, so
//! several engines can run side by side with independent registries.

pub mod kube_client;
pub mod memory;
pub mod registry;

pub use kube_client::KubeClusterClient;
pub use memory::{InMemoryCluster, Operation, WriteRecord};
pub use registry::TypeRegistry;

use crate::errors::ClusterError;
use async_trait::async_trait;
use kube::core::DynamicObject;
use kube::Resource;
use std::fmt;

/// Identifies an object type by `apiVersion` and `kind`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey {
    /// `group/version`, or just `version` for the core group
    pub api_version: String,
    /// Kind, e.g. `Deployment`
    pub kind: String,
}

impl TypeKey {
    /// Create a type key from its parts.
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    /// Type key of a statically typed resource.
    #[must_use]
    pub fn of<K: Resource<DynamicType = ()>>() -> Self {
        Self {
            api_version: K::api_version(&()).into_owned(),
            kind: K::kind(&()).into_owned(),
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.kind)
    }
}

/// Identifies a single namespaced object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Type of the object
    pub type_key: TypeKey,
    /// Namespace of the object
    pub namespace: String,
    /// Name of the object
    pub name: String,
}

impl ObjectKey {
    /// Create a key from its parts.
    pub fn new(type_key: TypeKey, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_key,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a statically typed resource.
    pub fn of<K: Resource<DynamicType = ()>>(
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::new(TypeKey::of::<K>(), namespace, name)
    }

    /// Derive the key of a dynamic object from its type and metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::Serialization`] when the object has no type information,
    /// name or namespace.
    pub fn from_object(object: &DynamicObject) -> Result<Self, ClusterError> {
        let types = object
            .types
            .as_ref()
            .ok_or_else(|| ClusterError::Serialization {
                kind: "DynamicObject".to_string(),
                message: "object has no apiVersion/kind".to_string(),
            })?;
        let missing = |field: &str| ClusterError::Serialization {
            kind: types.kind.clone(),
            message: format!("object has no {field}"),
        };
        let name = object.metadata.name.clone().ok_or_else(|| missing("name"))?;
        let namespace = object
            .metadata
            .namespace
            .clone()
            .ok_or_else(|| missing("namespace"))?;

        Ok(Self::new(
            TypeKey::new(types.api_version.clone(), types.kind.clone()),
            namespace,
            name,
        ))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.type_key.kind, self.namespace, self.name)
    }
}

/// Typed CRUD against the cluster API.
///
/// Implementations must be safe to share between worker tasks. Every method is a
/// single round trip; no implementation caches authoritative state.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch an object; `Ok(None)` when it does not exist.
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>, ClusterError>;

    /// List objects of a type in a namespace matching an equality label selector
    /// (`k1=v1,k2=v2`; empty matches everything).
    async fn list(
        &self,
        type_key: &TypeKey,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<DynamicObject>, ClusterError>;

    /// Create an object.
    async fn create(&self, object: &DynamicObject) -> Result<DynamicObject, ClusterError>;

    /// Replace an object. A set `metadata.resourceVersion` is checked for conflicts.
    async fn update(&self, object: &DynamicObject) -> Result<DynamicObject, ClusterError>;

    /// Replace only the status subresource. A set `metadata.resourceVersion` is
    /// checked for conflicts.
    async fn update_status(&self, object: &DynamicObject)
        -> Result<DynamicObject, ClusterError>;

    /// Delete an object. Deleting an absent object succeeds.
    async fn delete(&self, key: &ObjectKey) -> Result<(), ClusterError>;
}
