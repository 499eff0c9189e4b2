// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `memory.rs`

#[cfg(test)]
mod tests {
    use crate::cluster::{
        ClusterClient, InMemoryCluster, ObjectKey, Operation, TypeKey, TypeRegistry,
    };
    use crate::crd::{ManagedService, ManagedServiceSpec};
    use crate::errors::ClusterError;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::core::ObjectMeta;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn configmap(name: &str, labels: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.into()),
                namespace: Some("test-ns".into()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            data: Some(BTreeMap::from([("k".to_string(), "v".to_string())])),
            ..Default::default()
        }
    }

    fn managed_service() -> ManagedService {
        let mut resource = ManagedService::new("demo", ManagedServiceSpec::default());
        resource.metadata.namespace = Some("test-ns".into());
        resource
    }

    #[tokio::test]
    async fn test_create_assigns_server_metadata() {
        let registry = TypeRegistry::with_defaults();
        let cluster = InMemoryCluster::new();
        let object = registry.encode(&configmap("a", &[])).unwrap();

        let created = cluster.create(&object).await.unwrap();

        assert!(created.metadata.uid.is_some());
        assert!(created.metadata.resource_version.is_some());
        assert_eq!(created.metadata.generation, Some(1));
        assert_eq!(cluster.writes().len(), 1);
        assert_eq!(cluster.writes()[0].operation, Operation::Create);
    }

    #[tokio::test]
    async fn test_create_existing_object_fails() {
        let registry = TypeRegistry::with_defaults();
        let cluster = InMemoryCluster::new();
        cluster.seed(&registry, &configmap("a", &[])).unwrap();
        let object = registry.encode(&configmap("a", &[])).unwrap();

        let err = cluster.create(&object).await.unwrap_err();

        assert!(matches!(err, ClusterError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_stale_resource_version_conflicts() {
        let registry = TypeRegistry::with_defaults();
        let cluster = InMemoryCluster::new();
        let seeded = cluster.seed(&registry, &configmap("a", &[])).unwrap();
        let key = ObjectKey::from_object(&seeded).unwrap();

        assert!(cluster.mutate(&key, |o| o.data["data"]["k"] = json!("other")));
        let err = cluster.update(&seeded).await.unwrap_err();

        assert!(matches!(err, ClusterError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_generation_bumps_only_on_spec_change() {
        let registry = TypeRegistry::with_defaults();
        let cluster = InMemoryCluster::new();
        let seeded = cluster.seed(&registry, &managed_service()).unwrap();

        let mut relabeled = seeded.clone();
        relabeled
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert("team".into(), "a".into());
        let relabeled = cluster.update(&relabeled).await.unwrap();
        assert_eq!(relabeled.metadata.generation, Some(1));

        let mut rescaled = relabeled.clone();
        rescaled.data["spec"]["replicas"] = json!(3);
        let rescaled = cluster.update(&rescaled).await.unwrap();
        assert_eq!(rescaled.metadata.generation, Some(2));
    }

    #[tokio::test]
    async fn test_status_subresource_is_isolated() {
        let registry = TypeRegistry::with_defaults();
        let cluster = InMemoryCluster::new();
        let seeded = cluster.seed(&registry, &managed_service()).unwrap();

        let mut with_status = seeded.clone();
        with_status.data["status"] = json!({ "phase": "Ready", "conditions": [] });
        with_status.data["spec"]["replicas"] = json!(7);
        let stored = cluster.update_status(&with_status).await.unwrap();

        assert_eq!(stored.data["status"]["phase"], json!("Ready"));
        assert!(stored.data["spec"].get("replicas").is_none());

        let mut spec_change = stored.clone();
        spec_change.data["status"] = json!({ "phase": "Failed" });
        let stored = cluster.update(&spec_change).await.unwrap();
        assert_eq!(stored.data["status"]["phase"], json!("Ready"));
    }

    #[tokio::test]
    async fn test_list_filters_by_label_selector() {
        let registry = TypeRegistry::with_defaults();
        let cluster = InMemoryCluster::new();
        cluster
            .seed(&registry, &configmap("a", &[("app", "x"), ("tier", "web")]))
            .unwrap();
        cluster
            .seed(&registry, &configmap("b", &[("app", "y")]))
            .unwrap();

        let all = cluster
            .list(&TypeKey::of::<ConfigMap>(), "test-ns", "")
            .await
            .unwrap();
        let selected = cluster
            .list(&TypeKey::of::<ConfigMap>(), "test-ns", "app=x,tier=web")
            .await
            .unwrap();
        let other_namespace = cluster
            .list(&TypeKey::of::<ConfigMap>(), "elsewhere", "")
            .await
            .unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].metadata.name.as_deref(), Some("a"));
        assert!(other_namespace.is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_is_consumed_once() {
        let registry = TypeRegistry::with_defaults();
        let cluster = InMemoryCluster::new();
        cluster.seed(&registry, &configmap("a", &[])).unwrap();
        let key = ObjectKey::of::<ConfigMap>("test-ns", "a");
        cluster.inject_failure(
            Operation::Get,
            "ConfigMap",
            ClusterError::Transient {
                key: key.to_string(),
                message: "connection reset".into(),
            },
        );

        assert!(cluster.get(&key).await.is_err());
        assert!(cluster.get(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_absent_object_succeeds() {
        let cluster = InMemoryCluster::new();
        let key = ObjectKey::of::<ConfigMap>("test-ns", "missing");

        cluster.delete(&key).await.unwrap();

        assert!(!cluster.contains(&key));
    }

    #[tokio::test]
    async fn test_defaulter_fills_server_fields() {
        let registry = TypeRegistry::with_defaults();
        let cluster = InMemoryCluster::new();
        cluster.set_defaulter(|o| {
            if let Some(data) = o.data.as_object_mut() {
                data.insert("defaulted".into(), json!(true));
            }
        });
        let object = registry.encode(&configmap("a", &[])).unwrap();

        let created = cluster.create(&object).await.unwrap();

        assert_eq!(created.data["defaulted"], json!(true));
    }
}
