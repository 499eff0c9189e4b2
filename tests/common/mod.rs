// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::{Api, DeleteParams, PostParams};
use kube::client::Client;
use kube::core::ObjectMeta;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use steward::cluster::{InMemoryCluster, ObjectKey, TypeRegistry};
use steward::crd::{
    ConnectionProperties, ManagedService, ManagedServiceSpec, ManagedServiceStatus,
    SecretCredentials,
};
use steward::reconcilers::{ReconciliationEngine, ResourceKey};

pub const NAMESPACE: &str = "processes";
pub const NAME: &str = "data-index";

/// Engine wired to an in-memory cluster.
pub struct Harness {
    pub cluster: Arc<InMemoryCluster>,
    pub registry: Arc<TypeRegistry>,
    pub engine: ReconciliationEngine,
}

impl Harness {
    pub fn new() -> Self {
        let cluster = Arc::new(InMemoryCluster::new());
        let registry = Arc::new(TypeRegistry::with_defaults());
        let engine = ReconciliationEngine::new(cluster.clone(), registry.clone());
        Self {
            cluster,
            registry,
            engine,
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(NAMESPACE, NAME)
    }

    pub fn resource_key(&self) -> ObjectKey {
        ObjectKey::of::<ManagedService>(NAMESPACE, NAME)
    }

    /// Store a `ManagedService` named [`NAME`] in [`NAMESPACE`].
    pub fn seed_resource(&self, spec: ManagedServiceSpec) {
        let mut resource = ManagedService::new(NAME, spec);
        resource.metadata.namespace = Some(NAMESPACE.into());
        self.cluster.seed(&self.registry, &resource).unwrap();
    }

    pub fn seed_secret(&self, name: &str, user: &str, password: &str) {
        self.cluster
            .seed(&self.registry, &credential_secret(name, user, password))
            .unwrap();
    }

    pub fn fetch<K>(&self, name: &str) -> Option<K>
    where
        K: kube::Resource<DynamicType = ()> + serde::de::DeserializeOwned,
    {
        self.cluster.fetch::<K>(&self.registry, NAMESPACE, name)
    }

    pub fn status(&self) -> ManagedServiceStatus {
        self.fetch::<ManagedService>(NAME)
            .and_then(|r| r.status)
            .unwrap_or_default()
    }

    /// Replace the resource spec as a user edit would.
    pub fn edit_spec(&self, spec: &ManagedServiceSpec) {
        let spec = serde_json::to_value(spec).unwrap();
        assert!(self.cluster.mutate(&self.resource_key(), |object| {
            object.data["spec"] = spec;
            object.metadata.generation = object.metadata.generation.map(|g| g + 1);
        }));
    }
}

pub fn credential_secret(name: &str, user: &str, password: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.into()),
            namespace: Some(NAMESPACE.into()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([
            ("user".to_string(), ByteString(user.as_bytes().to_vec())),
            ("password".to_string(), ByteString(password.as_bytes().to_vec())),
        ])),
        ..Default::default()
    }
}

/// Spec of a data index backed by an authenticated data grid.
pub fn data_index_spec(secret_name: &str) -> ManagedServiceSpec {
    ManagedServiceSpec {
        service_type: steward::crd::ServiceType::DataIndex,
        connection_properties: Some(ConnectionProperties {
            uri: Some("infinispan.processes.svc:11222".into()),
            credentials: Some(SecretCredentials {
                secret_name: Some(secret_name.into()),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Create a test namespace
pub async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<k8s_openapi::api::core::v1::Namespace> = Api::all(client.clone());

    let ns = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "labels": {
                "test": "integration",
                "managed-by": "steward-test"
            }
        }
    }))?;

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {
            println!("Created test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("Test namespace already exists: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Delete a test namespace
pub async fn cleanup_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<k8s_openapi::api::core::v1::Namespace> = Api::all(client.clone());

    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            println!("Deleted test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
        Err(e) => Err(Box::new(e)),
    }
}
