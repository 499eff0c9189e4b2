// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for cluster access and reconciliation.
//!
//! This module provides:
//! - [`ClusterError`] - failures talking to the cluster API, classified so the
//!   engine can tell recoverable conditions (timeouts, conflicts) from real bugs
//! - [`ReconcileError`] - failures surfaced by a reconciliation pass, carrying
//!   the resource key and the stage that failed

use std::time::Duration;
use thiserror::Error;

/// Errors returned by a [`ClusterClient`](crate::cluster::ClusterClient).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    /// The object does not exist (HTTP 404).
    #[error("{key} not found")]
    NotFound {
        /// Display form of the object key
        key: String,
    },

    /// Create collided with an existing object (HTTP 409, reason `AlreadyExists`).
    #[error("{key} already exists")]
    AlreadyExists {
        /// Display form of the object key
        key: String,
    },

    /// Optimistic-concurrency collision: the object changed since it was read (HTTP 409).
    #[error("conflict writing {key}: the object has been modified")]
    Conflict {
        /// Display form of the object key
        key: String,
    },

    /// The call did not complete within its deadline.
    #[error("request for {key} timed out after {timeout:?}")]
    Timeout {
        /// Display form of the object key
        key: String,
        /// Deadline that was exceeded
        timeout: Duration,
    },

    /// Connection failure, rate limiting or server error (HTTP 429/5xx).
    #[error("transient cluster API error for {key}: {message}")]
    Transient {
        /// Display form of the object key
        key: String,
        /// Underlying error text
        message: String,
    },

    /// The API server rejected the object (HTTP 400/422).
    #[error("{key} rejected as invalid: {message}")]
    Invalid {
        /// Display form of the object key
        key: String,
        /// Validation message from the API server
        message: String,
    },

    /// The type is not registered in the [`TypeRegistry`](crate::cluster::TypeRegistry).
    #[error("type {api_version}/{kind} is not registered")]
    UnregisteredType {
        /// API version of the unknown type
        api_version: String,
        /// Kind of the unknown type
        kind: String,
    },

    /// An object could not be converted between its typed and dynamic forms.
    #[error("failed to convert {kind}: {message}")]
    Serialization {
        /// Kind being converted
        kind: String,
        /// Serializer error text
        message: String,
    },

    /// Any other API error.
    #[error("cluster API error {code} for {key}: {message}")]
    Api {
        /// Display form of the object key
        key: String,
        /// HTTP status code
        code: u16,
        /// Error message
        message: String,
    },
}

impl ClusterError {
    /// Whether the error is expected to clear on its own.
    ///
    /// Recoverable errors are answered with a requeue-with-backoff rather than
    /// an error return.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Transient { .. }
                | Self::Conflict { .. }
                | Self::AlreadyExists { .. }
        )
    }

    /// Short label for metrics.
    #[must_use]
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::Conflict { .. } => "conflict",
            Self::Timeout { .. } => "timeout",
            Self::Transient { .. } => "transient",
            Self::Invalid { .. } => "invalid",
            Self::UnregisteredType { .. } => "unregistered_type",
            Self::Serialization { .. } => "serialization",
            Self::Api { .. } => "api",
        }
    }
}

/// Stage of a reconciliation pass, recorded on errors for context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStage {
    /// Fetching the primary resource
    FetchResource,
    /// Fetching the credential secret
    FetchSecret,
    /// Building the desired dependents
    Compose,
    /// Creating, updating or pruning dependents
    ApplyDependents,
    /// Persisting the status subresource
    UpdateStatus,
}

impl std::fmt::Display for ReconcileStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            Self::FetchResource => "fetch-resource",
            Self::FetchSecret => "fetch-secret",
            Self::Compose => "compose",
            Self::ApplyDependents => "apply-dependents",
            Self::UpdateStatus => "update-status",
        };
        f.write_str(stage)
    }
}

/// Errors returned by [`ReconciliationEngine::reconcile`](crate::reconcilers::ReconciliationEngine::reconcile).
///
/// Recoverable failures never show up here; they are reported through status
/// conditions and a backoff requeue instead.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// A cluster API call failed in a way that is not expected to clear by itself.
    #[error("reconciling {key} failed at {stage}: {source}")]
    Cluster {
        /// `namespace/name` of the resource
        key: String,
        /// Stage that failed
        stage: ReconcileStage,
        /// Underlying cluster error
        #[source]
        source: ClusterError,
    },

    /// The status write kept conflicting with concurrent modifications.
    #[error("status update for {key} still conflicting after {attempts} attempts")]
    StatusConflict {
        /// `namespace/name` of the resource
        key: String,
        /// Number of attempts made
        attempts: u32,
    },
}

impl ReconcileError {
    /// Short label for metrics.
    #[must_use]
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::Cluster { source, .. } => source.metric_label(),
            Self::StatusConflict { .. } => "status_conflict",
        }
    }
}

/// A spec field that failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    /// JSON path of the offending field, e.g. `spec.connectionProperties.uri`
    pub field: String,
    /// What is wrong with it
    pub reason: String,
}

impl ValidationError {
    /// Create a validation error for `field`.
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
