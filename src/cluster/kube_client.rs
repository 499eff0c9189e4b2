// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`ClusterClient`] backed by the Kubernetes API server.

use super::{ClusterClient, ObjectKey, TypeKey, TypeRegistry};
use crate::constants::FIELD_MANAGER;
use crate::errors::ClusterError;
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::core::DynamicObject;
use kube::Client;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Cluster access through `kube::Api<DynamicObject>`.
///
/// Every call is bounded by `timeout`; an expired deadline surfaces as
/// [`ClusterError::Timeout`].
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
    registry: Arc<TypeRegistry>,
    timeout: Duration,
}

impl KubeClusterClient {
    /// Create a client addressing the types known to `registry`.
    #[must_use]
    pub fn new(client: Client, registry: Arc<TypeRegistry>, timeout: Duration) -> Self {
        Self {
            client,
            registry,
            timeout,
        }
    }

    fn api(&self, type_key: &TypeKey, namespace: &str) -> Result<Api<DynamicObject>, ClusterError> {
        let resource = self.registry.api_resource(type_key)?;
        Ok(Api::namespaced_with(self.client.clone(), namespace, resource))
    }

    /// Run one API call under the configured deadline.
    async fn call<T, F>(&self, key: &str, request: F) -> Result<T, ClusterError>
    where
        F: Future<Output = Result<T, kube::Error>> + Send,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(map_kube_error(key, e)),
            Err(_) => Err(ClusterError::Timeout {
                key: key.to_string(),
                timeout: self.timeout,
            }),
        }
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>, ClusterError> {
        let api = self.api(&key.type_key, &key.namespace)?;
        self.call(&key.to_string(), api.get_opt(&key.name)).await
    }

    async fn list(
        &self,
        type_key: &TypeKey,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<DynamicObject>, ClusterError> {
        let api = self.api(type_key, namespace)?;
        let params = ListParams::default().labels(label_selector);
        let list = self
            .call(&format!("{} {namespace}", type_key.kind), api.list(&params))
            .await?;
        Ok(list.items)
    }

    async fn create(&self, object: &DynamicObject) -> Result<DynamicObject, ClusterError> {
        let key = ObjectKey::from_object(object)?;
        let api = self.api(&key.type_key, &key.namespace)?;
        debug!(object = %key, "Creating object");
        self.call(&key.to_string(), api.create(&Self::post_params(), object))
            .await
    }

    async fn update(&self, object: &DynamicObject) -> Result<DynamicObject, ClusterError> {
        let key = ObjectKey::from_object(object)?;
        let api = self.api(&key.type_key, &key.namespace)?;
        debug!(object = %key, "Replacing object");
        self.call(
            &key.to_string(),
            api.replace(&key.name, &Self::post_params(), object),
        )
        .await
    }

    async fn update_status(
        &self,
        object: &DynamicObject,
    ) -> Result<DynamicObject, ClusterError> {
        let key = ObjectKey::from_object(object)?;
        let api = self.api(&key.type_key, &key.namespace)?;

        let patch = status_patch(object);
        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PatchParams::default()
        };
        debug!(object = %key, "Patching status");
        self.call(
            &key.to_string(),
            api.patch_status(&key.name, &params, &Patch::Merge(&patch)),
        )
        .await
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), ClusterError> {
        let api = self.api(&key.type_key, &key.namespace)?;
        debug!(object = %key, "Deleting object");
        match self
            .call(&key.to_string(), api.delete(&key.name, &DeleteParams::background()))
            .await
        {
            Ok(_) | Err(ClusterError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Merge patch replacing the status of `object`.
///
/// Carries `metadata.resourceVersion` when known, so the API server rejects the
/// patch with 409 if the object changed since it was read.
#[must_use]
pub fn status_patch(object: &DynamicObject) -> serde_json::Value {
    let mut patch = json!({ "status": object.data.get("status").cloned().unwrap_or_default() });
    if let Some(version) = &object.metadata.resource_version {
        patch["metadata"] = json!({ "resourceVersion": version });
    }
    patch
}

/// Classify a `kube::Error` for the engine.
///
/// # Classification
///
/// - **404** - [`ClusterError::NotFound`]
/// - **409** with reason `AlreadyExists` - [`ClusterError::AlreadyExists`]
/// - **409** otherwise - [`ClusterError::Conflict`]
/// - **400 / 422** - [`ClusterError::Invalid`]
/// - **429 / 5xx** and service (connection) failures - [`ClusterError::Transient`]
/// - anything else - [`ClusterError::Api`]
#[must_use]
pub fn map_kube_error(key: &str, err: kube::Error) -> ClusterError {
    let key = key.to_string();
    match err {
        kube::Error::Api(api_err) => match api_err.code {
            404 => ClusterError::NotFound { key },
            409 if api_err.reason == "AlreadyExists" => ClusterError::AlreadyExists { key },
            409 => ClusterError::Conflict { key },
            400 | 422 => ClusterError::Invalid {
                key,
                message: api_err.message.clone(),
            },
            code if code == 429 || (500..600).contains(&code) => ClusterError::Transient {
                key,
                message: api_err.message.clone(),
            },
            code => ClusterError::Api {
                key,
                code,
                message: api_err.message.clone(),
            },
        },
        kube::Error::Service(e) => ClusterError::Transient {
            key,
            message: e.to_string(),
        },
        other => ClusterError::Api {
            key,
            code: 0,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
#[path = "kube_client_tests.rs"]
mod kube_client_tests;
