// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Registry of the object types the operator reads and writes.
//!
//! The registry maps a [`TypeKey`] to the [`ApiResource`] needed to address it on the
//! API server, and converts between typed objects and [`DynamicObject`]s. It is built
//! once at startup and shared by reference; nothing about it is global.

use super::TypeKey;
use crate::crd::ManagedService;
use crate::errors::ClusterError;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use kube::core::{ApiResource, DynamicObject, TypeMeta};
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

/// Registered object types, keyed by `apiVersion` and `kind`.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: BTreeMap<TypeKey, ApiResource>,
}

impl TypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every type the `ManagedService` reconciler touches.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register::<ManagedService>()
            .register::<Deployment>()
            .register::<Service>()
            .register::<ConfigMap>()
            .register::<Secret>();
        registry
    }

    /// Register a statically typed resource.
    pub fn register<K: Resource<DynamicType = ()>>(&mut self) -> &mut Self {
        self.types
            .insert(TypeKey::of::<K>(), ApiResource::erase::<K>(&()));
        self
    }

    /// Whether a type is registered.
    #[must_use]
    pub fn contains(&self, type_key: &TypeKey) -> bool {
        self.types.contains_key(type_key)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no type is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// API resource used to address a registered type.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::UnregisteredType`] for unknown types.
    pub fn api_resource(&self, type_key: &TypeKey) -> Result<&ApiResource, ClusterError> {
        self.types
            .get(type_key)
            .ok_or_else(|| ClusterError::UnregisteredType {
                api_version: type_key.api_version.clone(),
                kind: type_key.kind.clone(),
            })
    }

    /// Convert a typed object into its dynamic form.
    ///
    /// # Errors
    ///
    /// Returns an error when the type is not registered or serialization fails.
    pub fn encode<K>(&self, object: &K) -> Result<DynamicObject, ClusterError>
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let type_key = TypeKey::of::<K>();
        self.api_resource(&type_key)?;

        let value = serde_json::to_value(object).map_err(|e| serialization(&type_key, &e))?;
        let mut dynamic: DynamicObject =
            serde_json::from_value(value).map_err(|e| serialization(&type_key, &e))?;
        dynamic.types = Some(TypeMeta {
            api_version: type_key.api_version,
            kind: type_key.kind,
        });
        Ok(dynamic)
    }

    /// Decode a dynamic object into a typed one.
    ///
    /// # Errors
    ///
    /// Returns an error when the type is not registered, the object carries a different
    /// type, or deserialization fails.
    pub fn decode<K>(&self, mut object: DynamicObject) -> Result<K, ClusterError>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let type_key = TypeKey::of::<K>();
        self.api_resource(&type_key)?;

        if let Some(types) = &object.types {
            if types.api_version != type_key.api_version || types.kind != type_key.kind {
                return Err(ClusterError::Serialization {
                    kind: type_key.kind.clone(),
                    message: format!(
                        "object is a {}/{}, not a {type_key}",
                        types.api_version, types.kind
                    ),
                });
            }
        }
        object.types = Some(TypeMeta {
            api_version: type_key.api_version.clone(),
            kind: type_key.kind.clone(),
        });

        let value = serde_json::to_value(&object).map_err(|e| serialization(&type_key, &e))?;
        serde_json::from_value(value).map_err(|e| serialization(&type_key, &e))
    }
}

fn serialization(type_key: &TypeKey, err: &serde_json::Error) -> ClusterError {
    ClusterError::Serialization {
        kind: type_key.kind.clone(),
        message: err.to_string(),
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod registry_tests;
