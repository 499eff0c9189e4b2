// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for managed services.
//!
//! This module defines the `ManagedService` custom resource: a declaratively
//! configured service (management console, data index, jobs service) that the
//! operator turns into a `Deployment`, a `Service` and, optionally, a properties
//! `ConfigMap`.
//!
//! # Example: Declaring a Managed Service
//!
//! ```rust,no_run
//! use steward::crd::{ConnectionProperties, ManagedServiceSpec, SecretCredentials, ServiceType};
//!
//! let spec = ManagedServiceSpec {
//!     service_type: ServiceType::DataIndex,
//!     replicas: Some(2),
//!     connection_properties: Some(ConnectionProperties {
//!         uri: Some("infinispan:11222".to_string()),
//!         credentials: Some(SecretCredentials {
//!             secret_name: Some("infinispan-credentials".to_string()),
//!             ..Default::default()
//!         }),
//!         ..Default::default()
//!     }),
//!     ..Default::default()
//! };
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of service the operator deploys.
///
/// Each kind maps to its own container image; all of them serve HTTP and may
/// consume the data grid connection environment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ServiceType {
    /// Web console for inspecting running process instances.
    #[default]
    ManagementConsole,

    /// Indexing service that stores process data in the data grid.
    DataIndex,

    /// Timer and job scheduling service.
    JobsService,
}

impl ServiceType {
    /// Image name (without registry or tag) of this service kind.
    #[must_use]
    pub fn image_name(self) -> &'static str {
        match self {
            Self::ManagementConsole => "kogito-management-console",
            Self::DataIndex => "kogito-data-index",
            Self::JobsService => "kogito-jobs-service",
        }
    }

    /// Value used for the `app.kubernetes.io/component` label.
    #[must_use]
    pub fn component(self) -> &'static str {
        match self {
            Self::ManagementConsole => "management-console",
            Self::DataIndex => "data-index",
            Self::JobsService => "jobs-service",
        }
    }
}

/// Reference to a secret carrying data grid credentials.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretCredentials {
    /// Name of the secret in the resource's namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,

    /// Key holding the username. Defaults to `user`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_key: Option<String>,

    /// Key holding the password. Defaults to `password`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_key: Option<String>,
}

/// How the service reaches an external Infinispan data grid.
///
/// Read once per reconciliation and never mutated by the operator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProperties {
    /// Comma-separated `host[:port]` server list (e.g., `infinispan:11222`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    /// Authentication realm on the data grid server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_realm: Option<String>,

    /// SASL mechanism (e.g., `PLAIN`, `DIGEST-MD5`, `SCRAM-SHA-512`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sasl_mechanism: Option<String>,

    /// Secret holding the username and password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<SecretCredentials>,
}

impl ConnectionProperties {
    /// Name of the referenced credential secret, if one is set and non-empty.
    #[must_use]
    pub fn credential_secret_name(&self) -> Option<&str> {
        self.credentials
            .as_ref()
            .and_then(|c| c.secret_name.as_deref())
            .filter(|name| !name.is_empty())
    }
}

/// `ManagedService` declares a service the operator deploys and keeps converged.
///
/// # Example
///
/// ```yaml
/// apiVersion: app.steward.dev/v1alpha1
/// kind: ManagedService
/// metadata:
///   name: data-index
///   namespace: processes
/// spec:
///   serviceType: DataIndex
///   replicas: 2
///   connectionProperties:
///     uri: infinispan:11222
///     credentials:
///       secretName: infinispan-credentials
/// ```
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "app.steward.dev",
    version = "v1alpha1",
    kind = "ManagedService",
    namespaced,
    shortname = "msvc",
    doc = "ManagedService declares a console or data-grid backed service. The operator owns a Deployment, a Service and an optional properties ConfigMap for each instance.",
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.serviceType"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Ready","type":"integer","jsonPath":".status.readyReplicas"}"#
)]
#[kube(status = "ManagedServiceStatus")]
#[serde(rename_all = "camelCase")]
pub struct ManagedServiceSpec {
    /// Which service to deploy.
    #[serde(default)]
    pub service_type: ServiceType,

    /// Desired number of pods. Defaults to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Full image reference overriding the resolved default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Image tag used with the default image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// HTTP port served by the container and exposed by the `Service`. Defaults to 8080.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_port: Option<i32>,

    /// Data grid connection wiring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_properties: Option<ConnectionProperties>,

    /// Application properties rendered into a mounted `application.properties` file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,
}

/// Condition represents an observation of a resource's current state.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, e.g. `Ready`.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Lifecycle phase of a `ManagedService`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Phase {
    /// Not reconciled yet.
    #[default]
    Unknown,
    /// Dependents are being created and have not all converged yet.
    Provisioning,
    /// Every dependent matches the desired state.
    Ready,
    /// Was ready, but a dependent no longer converges.
    Degraded,
    /// The spec is invalid; retried only on spec change or resync.
    Failed,
}

/// `ManagedService` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedServiceStatus {
    /// Conditions, one entry per type, in first-seen order.
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Current lifecycle phase.
    #[serde(default)]
    pub phase: Phase,

    /// Ready pods reported by the owned `Deployment`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<i32>,

    /// Image resolved for the workload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Generation last processed by the operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}
