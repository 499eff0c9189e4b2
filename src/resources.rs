// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired state of the objects a `ManagedService` owns.
//!
//! This module builds the `ConfigMap`, `Deployment` and `Service` for a resource.
//! All functions are pure: the same resource and secret always produce the same
//! objects, serialized byte for byte identically (every map is a `BTreeMap`), so the
//! engine's comparison against live state never sees a spurious difference.

use crate::cluster::{ObjectKey, TypeKey, TypeRegistry};
use crate::connection::{build_connection_env, to_env_vars};
use crate::constants::{
    API_GROUP_VERSION, APPLICATION_PROPERTIES_KEY, APPLICATION_PROPERTIES_MOUNT_PATH,
    CONTAINER_NAME_SERVICE, DEFAULT_HTTP_PORT, DEFAULT_IMAGE_REGISTRY, DEFAULT_IMAGE_VERSION,
    DEFAULT_REPLICAS, HTTP_PORT_NAME, KIND_MANAGED_SERVICE, LIVENESS_FAILURE_THRESHOLD,
    LIVENESS_INITIAL_DELAY_SECS, LIVENESS_PERIOD_SECS, LIVENESS_TIMEOUT_SECS,
    PROPERTIES_CONFIGMAP_SUFFIX, READINESS_FAILURE_THRESHOLD, READINESS_INITIAL_DELAY_SECS,
    READINESS_PERIOD_SECS, READINESS_TIMEOUT_SECS, VOLUME_APPLICATION_PROPERTIES,
};
use crate::crd::ManagedService;
use crate::errors::ClusterError;
use crate::labels::{
    CREDENTIALS_HASH_ANNOTATION, K8S_COMPONENT, K8S_INSTANCE, K8S_MANAGED_BY, K8S_NAME,
    K8S_PART_OF, MANAGED_BY_STEWARD, PART_OF_STEWARD, PROPERTIES_HASH_ANNOTATION,
    STEWARD_SERVICE_LABEL,
};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, PodSpec, PodTemplateSpec, Probe,
    Secret, Service, ServicePort, ServiceSpec, TCPSocketAction, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::core::{DynamicObject, ObjectMeta};
use kube::ResourceExt;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::debug;

/// One object the resource should own.
#[derive(Clone, Debug, PartialEq)]
pub enum DependentSpec {
    /// Rendered application properties
    ConfigMap(ConfigMap),
    /// The service workload
    Deployment(Deployment),
    /// Cluster-internal HTTP endpoint
    Service(Service),
}

impl DependentSpec {
    /// Kind of the object.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigMap(_) => "ConfigMap",
            Self::Deployment(_) => "Deployment",
            Self::Service(_) => "Service",
        }
    }

    /// Type key of the object.
    #[must_use]
    pub fn type_key(&self) -> TypeKey {
        match self {
            Self::ConfigMap(_) => TypeKey::of::<ConfigMap>(),
            Self::Deployment(_) => TypeKey::of::<Deployment>(),
            Self::Service(_) => TypeKey::of::<Service>(),
        }
    }

    fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::ConfigMap(o) => &o.metadata,
            Self::Deployment(o) => &o.metadata,
            Self::Service(o) => &o.metadata,
        }
    }

    /// Key addressing the object.
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        let meta = self.metadata();
        ObjectKey::new(
            self.type_key(),
            meta.namespace.clone().unwrap_or_default(),
            meta.name.clone().unwrap_or_default(),
        )
    }

    /// Dynamic form of the object, as sent to the cluster.
    ///
    /// # Errors
    ///
    /// Returns an error when the type is not registered or cannot be serialized.
    pub fn to_dynamic(&self, registry: &TypeRegistry) -> Result<DynamicObject, ClusterError> {
        match self {
            Self::ConfigMap(o) => registry.encode(o),
            Self::Deployment(o) => registry.encode(o),
            Self::Service(o) => registry.encode(o),
        }
    }
}

/// Types the engine may create for a resource, and therefore may prune.
#[must_use]
pub fn dependent_type_keys() -> Vec<TypeKey> {
    vec![
        TypeKey::of::<ConfigMap>(),
        TypeKey::of::<Deployment>(),
        TypeKey::of::<Service>(),
    ]
}

/// Compose every dependent of `resource`.
///
/// Order is fixed: the properties `ConfigMap` (only when properties are set), then the
/// `Deployment`, then the `Service`.
///
/// # Arguments
///
/// * `resource` - The `ManagedService` being reconciled
/// * `secret` - The fetched credential secret, when the resource references one
#[must_use]
pub fn compose(resource: &ManagedService, secret: Option<&Secret>) -> Vec<DependentSpec> {
    let mut dependents = Vec::with_capacity(3);

    let configmap = build_properties_configmap(resource);
    let properties_hash = configmap
        .as_ref()
        .and_then(|cm| cm.data.as_ref())
        .map(|data| checksum(data.iter().map(|(k, v)| (k.as_str(), v.as_bytes()))));

    if let Some(configmap) = configmap {
        dependents.push(DependentSpec::ConfigMap(configmap));
    }

    let credentials_hash = secret.map(secret_checksum);
    dependents.push(DependentSpec::Deployment(build_deployment(
        resource,
        secret,
        credentials_hash.as_deref(),
        properties_hash.as_deref(),
    )));
    dependents.push(DependentSpec::Service(build_service(resource)));

    debug!(
        name = %resource.name_any(),
        count = dependents.len(),
        "Composed desired dependents"
    );

    dependents
}

/// Standard labels carried by every dependent.
#[must_use]
pub fn build_labels(resource: &ManagedService) -> BTreeMap<String, String> {
    let mut labels = selector_labels(resource);
    labels.insert(K8S_NAME.into(), resource.spec.service_type.image_name().into());
    labels.insert(
        K8S_COMPONENT.into(),
        resource.spec.service_type.component().into(),
    );
    labels.insert(K8S_MANAGED_BY.into(), MANAGED_BY_STEWARD.into());
    labels.insert(K8S_PART_OF.into(), PART_OF_STEWARD.into());
    labels
}

/// Labels selecting the pods of `resource`. Immutable once the `Deployment` exists.
#[must_use]
pub fn selector_labels(resource: &ManagedService) -> BTreeMap<String, String> {
    let name = resource.name_any();
    BTreeMap::from([
        (K8S_INSTANCE.to_string(), name.clone()),
        (STEWARD_SERVICE_LABEL.to_string(), name),
    ])
}

/// Label selector matching every dependent of `resource`, in `k=v,k=v` form.
#[must_use]
pub fn dependent_selector(resource: &ManagedService) -> String {
    format!(
        "{STEWARD_SERVICE_LABEL}={},{K8S_MANAGED_BY}={MANAGED_BY_STEWARD}",
        resource.name_any()
    )
}

/// Controller owner reference pointing at `resource`.
#[must_use]
pub fn build_owner_references(resource: &ManagedService) -> Vec<OwnerReference> {
    vec![OwnerReference {
        api_version: API_GROUP_VERSION.to_string(),
        kind: KIND_MANAGED_SERVICE.to_string(),
        name: resource.name_any(),
        uid: resource.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }]
}

/// Image the workload runs.
///
/// `spec.image` wins when set; otherwise the service kind's image in the default
/// registry, tagged with `spec.version` or the default version.
#[must_use]
pub fn resolve_image(resource: &ManagedService) -> String {
    let spec = &resource.spec;
    if let Some(image) = spec.image.as_deref().filter(|i| !i.is_empty()) {
        return image.to_string();
    }
    let version = spec
        .version
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_IMAGE_VERSION);
    format!(
        "{DEFAULT_IMAGE_REGISTRY}/{}:{version}",
        spec.service_type.image_name()
    )
}

/// Name of the properties `ConfigMap` of `resource`.
#[must_use]
pub fn properties_configmap_name(resource: &ManagedService) -> String {
    format!("{}{PROPERTIES_CONFIGMAP_SUFFIX}", resource.name_any())
}

/// Render properties as `key=value` lines in key order.
///
/// Keys and values are escaped the way `java.util.Properties.store` escapes them,
/// so every entry loads back unchanged: separators (`=`, `:`), comment markers
/// (`#`, `!`), backslashes and line breaks are backslash-escaped, every space in a
/// key and a leading space in a value too. Non-ASCII text is kept as UTF-8, which
/// Quarkus reads `application.properties` as.
#[must_use]
pub fn render_properties(properties: &BTreeMap<String, String>) -> String {
    let mut rendered = String::new();
    for (key, value) in properties {
        escape_property(&mut rendered, key, true);
        rendered.push('=');
        escape_property(&mut rendered, value, false);
        rendered.push('\n');
    }
    rendered
}

fn escape_property(out: &mut String, text: &str, is_key: bool) {
    for (i, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0c' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04X}", u32::from(c));
            }
            c => out.push(c),
        }
    }
}

/// Builds the `ConfigMap` holding `application.properties`.
///
/// Returns `None` when the resource sets no properties.
#[must_use]
pub fn build_properties_configmap(resource: &ManagedService) -> Option<ConfigMap> {
    let properties = resource
        .spec
        .properties
        .as_ref()
        .filter(|p| !p.is_empty())?;

    Some(ConfigMap {
        metadata: dependent_metadata(resource, properties_configmap_name(resource)),
        data: Some(BTreeMap::from([(
            APPLICATION_PROPERTIES_KEY.to_string(),
            render_properties(properties),
        )])),
        ..Default::default()
    })
}

/// Builds the workload `Deployment`.
///
/// The single container's environment is exactly the connection environment. The pod
/// template carries checksum annotations of the credential secret and the rendered
/// properties so that changing either rolls the pods; both annotations are always
/// present (empty when not applicable) so that removing a secret or properties
/// also shows up as a difference.
///
/// # Arguments
///
/// * `resource` - The owning `ManagedService`
/// * `secret` - The fetched credential secret, if any
/// * `credentials_hash` - Checksum of the secret data
/// * `properties_hash` - Checksum of the properties `ConfigMap` data
#[must_use]
pub fn build_deployment(
    resource: &ManagedService,
    secret: Option<&Secret>,
    credentials_hash: Option<&str>,
    properties_hash: Option<&str>,
) -> Deployment {
    let name = resource.name_any();
    let labels = build_labels(resource);
    let replicas = resource.spec.replicas.unwrap_or(DEFAULT_REPLICAS);
    let http_port = resource.spec.http_port.unwrap_or(DEFAULT_HTTP_PORT);

    let connection = resource
        .spec
        .connection_properties
        .clone()
        .unwrap_or_default();
    let env = to_env_vars(&build_connection_env(&connection, secret));

    let has_properties = properties_hash.is_some();
    let volumes = if has_properties {
        vec![Volume {
            name: VOLUME_APPLICATION_PROPERTIES.into(),
            config_map: Some(ConfigMapVolumeSource {
                name: properties_configmap_name(resource),
                ..Default::default()
            }),
            ..Default::default()
        }]
    } else {
        Vec::new()
    };
    let volume_mounts = if has_properties {
        vec![VolumeMount {
            name: VOLUME_APPLICATION_PROPERTIES.into(),
            mount_path: APPLICATION_PROPERTIES_MOUNT_PATH.into(),
            read_only: Some(true),
            ..Default::default()
        }]
    } else {
        Vec::new()
    };

    let annotations = BTreeMap::from([
        (
            CREDENTIALS_HASH_ANNOTATION.to_string(),
            credentials_hash.unwrap_or_default().to_string(),
        ),
        (
            PROPERTIES_HASH_ANNOTATION.to_string(),
            properties_hash.unwrap_or_default().to_string(),
        ),
    ]);

    debug!(
        name = %name,
        replicas,
        http_port,
        env_count = env.len(),
        "Building Deployment for ManagedService"
    );

    Deployment {
        metadata: dependent_metadata(resource, name),
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(selector_labels(resource)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    annotations: Some(annotations),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: CONTAINER_NAME_SERVICE.into(),
                        image: Some(resolve_image(resource)),
                        env: Some(env),
                        ports: Some(vec![ContainerPort {
                            name: Some(HTTP_PORT_NAME.into()),
                            container_port: http_port,
                            protocol: Some("TCP".into()),
                            ..Default::default()
                        }]),
                        liveness_probe: Some(tcp_probe(
                            http_port,
                            LIVENESS_INITIAL_DELAY_SECS,
                            LIVENESS_PERIOD_SECS,
                            LIVENESS_TIMEOUT_SECS,
                            LIVENESS_FAILURE_THRESHOLD,
                        )),
                        readiness_probe: Some(tcp_probe(
                            http_port,
                            READINESS_INITIAL_DELAY_SECS,
                            READINESS_PERIOD_SECS,
                            READINESS_TIMEOUT_SECS,
                            READINESS_FAILURE_THRESHOLD,
                        )),
                        volume_mounts: Some(volume_mounts),
                        ..Default::default()
                    }],
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Builds the `ClusterIP` `Service` exposing the HTTP port.
#[must_use]
pub fn build_service(resource: &ManagedService) -> Service {
    let http_port = resource.spec.http_port.unwrap_or(DEFAULT_HTTP_PORT);

    Service {
        metadata: dependent_metadata(resource, resource.name_any()),
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(resource)),
            ports: Some(vec![ServicePort {
                name: Some(HTTP_PORT_NAME.into()),
                port: http_port,
                target_port: Some(IntOrString::Int(http_port)),
                protocol: Some("TCP".into()),
                ..Default::default()
            }]),
            type_: Some("ClusterIP".into()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn dependent_metadata(resource: &ManagedService, name: String) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: resource.namespace(),
        labels: Some(build_labels(resource)),
        owner_references: Some(build_owner_references(resource)),
        ..Default::default()
    }
}

fn tcp_probe(port: i32, initial_delay: i32, period: i32, timeout: i32, failures: i32) -> Probe {
    Probe {
        tcp_socket: Some(TCPSocketAction {
            port: IntOrString::Int(port),
            ..Default::default()
        }),
        initial_delay_seconds: Some(initial_delay),
        period_seconds: Some(period),
        timeout_seconds: Some(timeout),
        failure_threshold: Some(failures),
        ..Default::default()
    }
}

/// SHA-256 over a secret's data in key order. `stringData` overrides `data`, as on
/// the API server.
fn secret_checksum(secret: &Secret) -> String {
    let mut entries: BTreeMap<&str, &[u8]> = BTreeMap::new();
    if let Some(data) = &secret.data {
        for (k, v) in data {
            entries.insert(k, &v.0);
        }
    }
    if let Some(string_data) = &secret.string_data {
        for (k, v) in string_data {
            entries.insert(k, v.as_bytes());
        }
    }
    checksum(entries)
}

fn checksum<'a>(entries: impl IntoIterator<Item = (&'a str, &'a [u8])>) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in entries {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(value);
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
