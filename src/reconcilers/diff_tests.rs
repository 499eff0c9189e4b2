// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `diff.rs`

#[cfg(test)]
mod tests {
    use crate::reconcilers::diff::{is_owned_by, is_subset, merge_onto_live, needs_update};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
    use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn service(data: serde_json::Value) -> DynamicObject {
        let resource = ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "Service"));
        DynamicObject::new("demo", &resource)
            .within("test-ns")
            .data(data)
    }

    fn owner(uid: &str, controller: bool) -> OwnerReference {
        OwnerReference {
            api_version: "app.steward.dev/v1alpha1".into(),
            kind: "ManagedService".into(),
            name: "demo".into(),
            uid: uid.into(),
            controller: Some(controller),
            block_owner_deletion: Some(true),
        }
    }

    #[test]
    fn test_server_populated_fields_are_ignored() {
        let desired = json!({ "spec": { "type": "ClusterIP", "ports": [{ "port": 8080 }] } });
        let live = json!({
            "spec": {
                "type": "ClusterIP",
                "clusterIP": "10.0.0.12",
                "sessionAffinity": "None",
                "ports": [{ "port": 8080, "protocol": "TCP", "targetPort": 8080 }]
            },
            "status": { "loadBalancer": {} }
        });

        assert!(is_subset(&desired, &live));
    }

    #[test]
    fn test_changed_scalar_is_detected() {
        let desired = json!({ "spec": { "replicas": 3 } });
        let live = json!({ "spec": { "replicas": 1 } });

        assert!(!is_subset(&desired, &live));
    }

    #[test]
    fn test_missing_in_live_equals_empty_in_desired() {
        let desired = json!({
            "spec": { "volumes": [], "annotations": {}, "note": "", "x": null }
        });
        let live = json!({ "spec": {} });

        assert!(is_subset(&desired, &live));
    }

    #[test]
    fn test_empty_desired_array_against_populated_live_differs() {
        let desired = json!({ "volumes": [] });
        let live = json!({ "volumes": [{ "name": "application-properties" }] });

        assert!(!is_subset(&desired, &live));
    }

    #[test]
    fn test_array_order_matters() {
        let desired = json!({ "env": [{ "name": "A" }, { "name": "B" }] });
        let live = json!({ "env": [{ "name": "B" }, { "name": "A" }] });

        assert!(!is_subset(&desired, &live));
    }

    #[test]
    fn test_needs_update_ignores_status_and_foreign_labels() {
        let mut desired = service(json!({ "spec": { "type": "ClusterIP" } }));
        desired.metadata.labels = Some(BTreeMap::from([("app".into(), "demo".into())]));
        let mut live = service(json!({
            "spec": { "type": "ClusterIP", "clusterIP": "10.0.0.1" },
            "status": {}
        }));
        live.metadata.labels = Some(BTreeMap::from([
            ("app".into(), "demo".into()),
            ("injected-by".into(), "mesh".into()),
        ]));

        assert!(!needs_update(&desired, &live));
    }

    #[test]
    fn test_needs_update_detects_label_drift() {
        let mut desired = service(json!({}));
        desired.metadata.labels = Some(BTreeMap::from([("app".into(), "demo".into())]));
        let mut live = service(json!({}));
        live.metadata.labels = Some(BTreeMap::from([("app".into(), "other".into())]));

        assert!(needs_update(&desired, &live));
    }

    #[test]
    fn test_merge_keeps_server_fields_and_resource_version() {
        let desired = service(json!({
            "spec": { "type": "ClusterIP", "ports": [{ "port": 9090 }] }
        }));
        let mut live = service(json!({
            "spec": {
                "type": "ClusterIP",
                "clusterIP": "10.0.0.12",
                "ports": [{ "port": 8080, "protocol": "TCP" }]
            }
        }));
        live.metadata.resource_version = Some("42".into());
        live.metadata.labels = Some(BTreeMap::from([("injected".into(), "yes".into())]));

        let merged = merge_onto_live(&desired, &live);

        assert_eq!(merged.data["spec"]["clusterIP"], json!("10.0.0.12"));
        assert_eq!(merged.data["spec"]["ports"], json!([{ "port": 9090 }]));
        assert_eq!(merged.metadata.resource_version.as_deref(), Some("42"));
        assert_eq!(
            merged.metadata.labels.as_ref().unwrap().get("injected"),
            Some(&"yes".to_string())
        );
        assert!(!needs_update(&desired, &merged));
    }

    #[test]
    fn test_ownership_requires_controller_reference_with_uid() {
        let mut owned = service(json!({}));
        owned.metadata.owner_references = Some(vec![owner("uid-1", true)]);
        let mut non_controller = service(json!({}));
        non_controller.metadata.owner_references = Some(vec![owner("uid-1", false)]);
        let unowned = service(json!({}));

        assert!(is_owned_by(&owned, "uid-1"));
        assert!(!is_owned_by(&owned, "uid-2"));
        assert!(!is_owned_by(&owned, ""));
        assert!(!is_owned_by(&non_controller, "uid-1"));
        assert!(!is_owned_by(&unowned, "uid-1"));
    }
}
