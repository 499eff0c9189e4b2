// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used on every dependent object.
//!
//! The standard `app.kubernetes.io/*` labels double as the selector used to find
//! dependents when pruning, so they must stay stable across releases.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of the application
pub const K8S_NAME: &str = "app.kubernetes.io/name";

/// Standard label for a unique name identifying the instance of an application
pub const K8S_INSTANCE: &str = "app.kubernetes.io/instance";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

// ============================================================================
// Kubernetes Standard Label Values
// ============================================================================

/// Value for `app.kubernetes.io/part-of`
pub const PART_OF_STEWARD: &str = "steward";

/// Value for `app.kubernetes.io/managed-by`
pub const MANAGED_BY_STEWARD: &str = "steward-operator";

// ============================================================================
// Steward-Specific Labels and Annotations
// ============================================================================

/// Label carrying the owning `ManagedService` name; used as the pod selector
pub const STEWARD_SERVICE_LABEL: &str = "app.steward.dev/managed-service";

/// Pod template annotation holding a checksum of the credential secret data
pub const CREDENTIALS_HASH_ANNOTATION: &str = "app.steward.dev/credentials-hash";

/// Pod template annotation holding a checksum of the properties `ConfigMap` data
pub const PROPERTIES_HASH_ANNOTATION: &str = "app.steward.dev/properties-hash";
