// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers for `ManagedService` resources.
//!
//! This module provides utility functions for creating and managing Kubernetes
//! status conditions following the standard conventions, and the
//! [`ManagedServiceStatusUpdater`] that persists a reconciliation's result.
//!
//! # Condition Format
//!
//! Kubernetes conditions follow a standard format:
//! - `type`: The aspect of the resource being reported (e.g., "Ready")
//! - `status`: "True", "False", or "Unknown"
//! - `reason`: A programmatic identifier (CamelCase)
//! - `message`: A human-readable explanation
//! - `lastTransitionTime`: RFC3339 timestamp when the status last changed
//!
//! # Example
//!
//! ```rust
//! use steward::reconcilers::status::{apply_outcome_at, ReconcileOutcome};
//!
//! let outcome = ReconcileOutcome::Converged {
//!     message: "2 dependents in sync".into(),
//! };
//! let first = apply_outcome_at(&[], &outcome, "2025-01-01T00:00:00Z");
//! let second = apply_outcome_at(&first, &outcome, "2025-01-01T00:05:00Z");
//!
//! assert_eq!(first, second);
//! ```

use crate::cluster::{ClusterClient, ObjectKey, TypeRegistry};
use crate::constants::STATUS_UPDATE_MAX_ATTEMPTS;
use crate::crd::{Condition, ManagedService, ManagedServiceStatus, Phase};
use crate::errors::{ClusterError, ReconcileError, ReconcileStage};
use crate::status_reasons::{
    CONDITION_STATUS_FALSE, CONDITION_STATUS_TRUE, CONDITION_TYPE_READY,
    REASON_ALL_DEPENDENTS_READY, REASON_CREDENTIAL_SECRET_NOT_FOUND, REASON_DEPENDENTS_PROGRESSING,
    REASON_DEPENDENT_CONFLICT, REASON_DEPENDENT_FAILED, REASON_INVALID_SPEC,
};
use chrono::Utc;
use kube::ResourceExt;
use tracing::{debug, warn};

/// Result of one reconciliation pass, as reported through the `Ready` condition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Every dependent already matched the desired state.
    Converged {
        /// Human-readable summary
        message: String,
    },
    /// Dependents were written in this pass.
    Progressing {
        /// Human-readable summary
        message: String,
    },
    /// The referenced credential secret does not exist.
    SecretMissing {
        /// Human-readable summary
        message: String,
    },
    /// At least one dependent could not be written or read.
    DependentFailed {
        /// Human-readable summary
        message: String,
    },
    /// A dependent's name is taken by an object this resource does not own.
    DependentConflict {
        /// Human-readable summary
        message: String,
    },
    /// The spec failed validation.
    InvalidSpec {
        /// Human-readable summary
        message: String,
    },
}

impl ReconcileOutcome {
    /// Status of the `Ready` condition for this outcome.
    #[must_use]
    pub fn condition_status(&self) -> &'static str {
        match self {
            Self::Converged { .. } => CONDITION_STATUS_TRUE,
            _ => CONDITION_STATUS_FALSE,
        }
    }

    /// Reason of the `Ready` condition for this outcome.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Converged { .. } => REASON_ALL_DEPENDENTS_READY,
            Self::Progressing { .. } => REASON_DEPENDENTS_PROGRESSING,
            Self::SecretMissing { .. } => REASON_CREDENTIAL_SECRET_NOT_FOUND,
            Self::DependentFailed { .. } => REASON_DEPENDENT_FAILED,
            Self::DependentConflict { .. } => REASON_DEPENDENT_CONFLICT,
            Self::InvalidSpec { .. } => REASON_INVALID_SPEC,
        }
    }

    /// Message of the `Ready` condition for this outcome.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Converged { message }
            | Self::Progressing { message }
            | Self::SecretMissing { message }
            | Self::DependentFailed { message }
            | Self::DependentConflict { message }
            | Self::InvalidSpec { message } => message,
        }
    }

    /// Whether the outcome reports a failure rather than progress.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::SecretMissing { .. }
                | Self::DependentFailed { .. }
                | Self::DependentConflict { .. }
        )
    }
}

/// Next lifecycle phase given the current one and a pass's outcome.
///
/// ```text
/// Unknown ──► Provisioning ──► Ready ──► Degraded ──► Provisioning / Ready
///    any ──► Failed (invalid spec)
/// ```
///
/// A failure before the resource was ever ready keeps it provisioning; a failure
/// after that degrades it.
#[must_use]
pub fn next_phase(current: Phase, outcome: &ReconcileOutcome) -> Phase {
    match outcome {
        ReconcileOutcome::InvalidSpec { .. } => Phase::Failed,
        ReconcileOutcome::Converged { .. } => Phase::Ready,
        ReconcileOutcome::Progressing { .. } => Phase::Provisioning,
        _ => match current {
            Phase::Ready | Phase::Degraded => Phase::Degraded,
            Phase::Unknown | Phase::Provisioning | Phase::Failed => Phase::Provisioning,
        },
    }
}

/// Create a new Kubernetes condition stamped with `now`.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
    now: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(now.to_string()),
    }
}

/// Find a condition by type in a list of conditions.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in a mutable conditions list (in-memory, no API call).
///
/// An existing condition keeps its position and its `lastTransitionTime` unless its
/// status changes; a new condition is appended.
///
/// # Arguments
///
/// * `conditions` - Mutable reference to the conditions list
/// * `condition_type` - The type of condition (e.g., "Ready")
/// * `status` - The status: "True", "False", or "Unknown"
/// * `reason` - A programmatic identifier in `CamelCase`
/// * `message` - A human-readable explanation
/// * `now` - RFC3339 timestamp used when the status transitions
pub fn set_condition_at(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
    now: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| now.to_string())
        } else {
            now.to_string()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_transition_time = Some(last_transition_time);
    } else {
        conditions.push(create_condition(condition_type, status, reason, message, now));
    }
}

/// Fold a reconcile outcome into the current conditions, using the current time.
#[must_use]
pub fn apply_outcome(current: &[Condition], outcome: &ReconcileOutcome) -> Vec<Condition> {
    apply_outcome_at(current, outcome, &Utc::now().to_rfc3339())
}

/// Fold a reconcile outcome into the current conditions.
///
/// Pure and idempotent: applying the same outcome twice yields the same list, with
/// the transition time of the first application.
#[must_use]
pub fn apply_outcome_at(
    current: &[Condition],
    outcome: &ReconcileOutcome,
    now: &str,
) -> Vec<Condition> {
    let mut conditions = current.to_vec();
    set_condition_at(
        &mut conditions,
        CONDITION_TYPE_READY,
        outcome.condition_status(),
        outcome.reason(),
        outcome.message(),
        now,
    );
    conditions
}

/// Compare two condition lists semantically, ignoring `lastTransitionTime`.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    if current.len() != new.len() {
        return false;
    }

    new.iter().all(|new_cond| {
        find_condition(current, &new_cond.r#type).is_some_and(|curr_cond| {
            curr_cond.status == new_cond.status
                && curr_cond.reason == new_cond.reason
                && curr_cond.message == new_cond.message
        })
    })
}

/// Compare two statuses semantically, ignoring condition transition times.
#[must_use]
pub fn status_equal(current: &ManagedServiceStatus, new: &ManagedServiceStatus) -> bool {
    current.phase == new.phase
        && current.ready_replicas == new.ready_replicas
        && current.image == new.image
        && current.observed_generation == new.observed_generation
        && conditions_equal(&current.conditions, &new.conditions)
}

/// Collects the status of one reconciliation pass and persists it.
///
/// Fields left unset keep whatever the live status holds. The write goes through the
/// status subresource and only happens when the status changed semantically. A
/// conflicting write re-reads the resource and recomputes the status from the fresh
/// copy, up to [`STATUS_UPDATE_MAX_ATTEMPTS`] times.
#[derive(Clone, Debug)]
pub struct ManagedServiceStatusUpdater {
    outcome: ReconcileOutcome,
    ready_replicas: Option<i32>,
    image: Option<String>,
    observed_generation: Option<i64>,
}

impl ManagedServiceStatusUpdater {
    /// Start a status update reporting `outcome`.
    #[must_use]
    pub fn new(outcome: ReconcileOutcome) -> Self {
        Self {
            outcome,
            ready_replicas: None,
            image: None,
            observed_generation: None,
        }
    }

    /// Record the ready replica count of the workload.
    #[must_use]
    pub fn ready_replicas(mut self, ready_replicas: i32) -> Self {
        self.ready_replicas = Some(ready_replicas);
        self
    }

    /// Record the resolved workload image.
    #[must_use]
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Record the generation this pass reconciled.
    #[must_use]
    pub fn observed_generation(mut self, generation: Option<i64>) -> Self {
        self.observed_generation = generation;
        self
    }

    /// Outcome being reported.
    #[must_use]
    pub fn outcome(&self) -> &ReconcileOutcome {
        &self.outcome
    }

    /// Status that results from applying this update to `current` at time `now`.
    #[must_use]
    pub fn desired_status(
        &self,
        current: &ManagedServiceStatus,
        now: &str,
    ) -> ManagedServiceStatus {
        ManagedServiceStatus {
            conditions: apply_outcome_at(&current.conditions, &self.outcome, now),
            phase: next_phase(current.phase, &self.outcome),
            ready_replicas: self.ready_replicas.or(current.ready_replicas),
            image: self.image.clone().or_else(|| current.image.clone()),
            observed_generation: self.observed_generation.or(current.observed_generation),
        }
    }

    /// Persist the status of `resource`.
    ///
    /// Returns `Ok(true)` when a write happened, `Ok(false)` when the status was
    /// already current or the resource disappeared meanwhile.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::StatusConflict`] when every attempt conflicted, and
    /// [`ReconcileError::Cluster`] for any other failed call.
    pub async fn apply(
        &self,
        client: &dyn ClusterClient,
        registry: &TypeRegistry,
        resource: &ManagedService,
    ) -> Result<bool, ReconcileError> {
        let namespace = resource.namespace().unwrap_or_default();
        let name = resource.name_any();
        let display_key = format!("{namespace}/{name}");
        let cluster_error = |source: ClusterError| ReconcileError::Cluster {
            key: display_key.clone(),
            stage: ReconcileStage::UpdateStatus,
            source,
        };

        let mut current = resource.clone();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let existing = current.status.clone().unwrap_or_default();
            let desired = self.desired_status(&existing, &Utc::now().to_rfc3339());
            if status_equal(&existing, &desired) {
                debug!(
                    namespace = %namespace,
                    name = %name,
                    "ManagedService status unchanged, skipping update"
                );
                return Ok(false);
            }

            let mut updated = current.clone();
            updated.status = Some(desired);
            let object = registry.encode(&updated).map_err(cluster_error)?;

            match client.update_status(&object).await {
                Ok(_) => {
                    debug!(
                        namespace = %namespace,
                        name = %name,
                        attempt,
                        reason = self.outcome.reason(),
                        "Updated ManagedService status"
                    );
                    return Ok(true);
                }
                Err(ClusterError::Conflict { .. }) if attempt < STATUS_UPDATE_MAX_ATTEMPTS => {
                    warn!(
                        namespace = %namespace,
                        name = %name,
                        attempt,
                        "Status update conflicted, re-reading resource"
                    );
                    let key = ObjectKey::of::<ManagedService>(namespace.clone(), name.clone());
                    match client.get(&key).await.map_err(cluster_error)? {
                        Some(fresh) => current = registry.decode(fresh).map_err(cluster_error)?,
                        None => return Ok(false),
                    }
                }
                Err(ClusterError::Conflict { .. }) => {
                    return Err(ReconcileError::StatusConflict {
                        key: display_key.clone(),
                        attempts: attempt,
                    });
                }
                Err(e) => return Err(cluster_error(e)),
            }
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
