// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `ManagedService` reconciliation engine.
//!
//! One pass of [`ReconciliationEngine::reconcile`]:
//!
//! 1. Fetch the resource; absent or being deleted means nothing to do (owner
//!    references let the garbage collector remove the dependents)
//! 2. Validate the spec; an invalid spec is reported and not requeued
//! 3. Fetch the credential secret, if one is referenced
//! 4. Compose the desired dependents
//! 5. Create, update or refuse each dependent, continuing past individual failures
//! 6. Prune owned dependents that are no longer desired
//! 7. Persist the status when it changed
//! 8. Tell the queue whether and when to come back
//!
//! Every pass re-reads everything from the cluster; nothing is cached between passes,
//! so retrying a pass at any point is safe.

use super::diff::{controller_owner, is_owned_by, merge_onto_live, needs_update};
use super::status::{ManagedServiceStatusUpdater, ReconcileOutcome};
use super::validation::validate_spec;
use super::{Requeue, ResourceKey};
use crate::cluster::{ClusterClient, ObjectKey, TypeRegistry};
use crate::crd::ManagedService;
use crate::errors::{ClusterError, ReconcileError, ReconcileStage};
use crate::metrics;
use crate::resources::{compose, dependent_selector, dependent_type_keys, resolve_image};
use k8s_openapi::api::core::v1::Secret;
use kube::core::DynamicObject;
use kube::ResourceExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What happened to one dependent during a pass.
#[derive(Clone, Debug, PartialEq, Eq)]
enum DependentAction {
    Created,
    Updated,
    Unchanged,
    Deleted,
    /// The name is taken by an object that is not ours.
    Refused { owner: Option<String> },
}

/// Tally of one pass over the dependents.
#[derive(Default)]
struct PassReport {
    writes: usize,
    unchanged: usize,
    conflicts: Vec<String>,
    failures: Vec<String>,
    fatal: Option<(String, ClusterError)>,
    ready_replicas: Option<i32>,
}

impl PassReport {
    fn record(&mut self, key: &ObjectKey, action: DependentAction) {
        match action {
            DependentAction::Created | DependentAction::Updated | DependentAction::Deleted => {
                self.writes += 1;
            }
            DependentAction::Unchanged => self.unchanged += 1,
            DependentAction::Refused { owner } => self.conflicts.push(match owner {
                Some(owner) => format!("{key} is controlled by {owner}"),
                None => format!("{key} exists and is not owned by this resource"),
            }),
        }
    }

    fn fail(&mut self, key: &ObjectKey, err: ClusterError) {
        metrics::record_error(err.metric_label());
        self.failures.push(format!("{key}: {err}"));
        if !err.is_recoverable() && self.fatal.is_none() {
            self.fatal = Some((key.to_string(), err));
        }
    }

    fn outcome(&self) -> ReconcileOutcome {
        if !self.failures.is_empty() {
            ReconcileOutcome::DependentFailed {
                message: self.failures.join("; "),
            }
        } else if !self.conflicts.is_empty() {
            ReconcileOutcome::DependentConflict {
                message: self.conflicts.join("; "),
            }
        } else if self.writes > 0 {
            ReconcileOutcome::Progressing {
                message: format!(
                    "{} dependent(s) written, waiting for them to settle",
                    self.writes
                ),
            }
        } else {
            ReconcileOutcome::Converged {
                message: format!("{} dependent(s) in sync", self.unchanged),
            }
        }
    }
}

/// Drives `ManagedService` resources toward their desired state.
///
/// The engine is stateless between passes and safe to share between workers.
pub struct ReconciliationEngine {
    client: Arc<dyn ClusterClient>,
    registry: Arc<TypeRegistry>,
}

impl ReconciliationEngine {
    /// Create an engine over `client`, converting objects with `registry`.
    #[must_use]
    pub fn new(client: Arc<dyn ClusterClient>, registry: Arc<TypeRegistry>) -> Self {
        Self { client, registry }
    }

    /// Registry used by the engine.
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Client used by the engine.
    #[must_use]
    pub fn client(&self) -> &dyn ClusterClient {
        self.client.as_ref()
    }

    /// Reconcile one resource.
    ///
    /// # Returns
    ///
    /// - `Requeue::None` when converged, when progress was made (the resulting watch
    ///   events bring the key back), for an invalid spec, and for refused dependents
    /// - `Requeue::Backoff` for recoverable failures: timeouts, transient API errors,
    ///   write conflicts, a missing credential secret, a status write that did not land
    ///
    /// # Errors
    ///
    /// Returns an error for failures that retrying is not expected to fix, and when the
    /// status write keeps conflicting.
    pub async fn reconcile(&self, key: &ResourceKey) -> Result<Requeue, ReconcileError> {
        let start = Instant::now();
        let (label, result) = match self.reconcile_inner(key).await {
            Ok((label, requeue)) => (label, Ok(requeue)),
            Err(e) => ("error", Err(e)),
        };
        metrics::record_reconciliation(label, start.elapsed());
        result
    }

    async fn reconcile_inner(
        &self,
        key: &ResourceKey,
    ) -> Result<(&'static str, Requeue), ReconcileError> {
        let object_key = ObjectKey::of::<ManagedService>(&key.namespace, &key.name);

        let resource = match self.client.get(&object_key).await {
            Ok(Some(object)) => self
                .registry
                .decode::<ManagedService>(object)
                .map_err(|e| cluster_error(key, ReconcileStage::FetchResource, e))?,
            Ok(None) => {
                debug!(
                    namespace = %key.namespace,
                    name = %key.name,
                    "ManagedService not found, nothing to do"
                );
                return Ok(("absent", Requeue::None));
            }
            Err(e) => return recover(key, ReconcileStage::FetchResource, e),
        };

        if resource.metadata.deletion_timestamp.is_some() {
            debug!(
                namespace = %key.namespace,
                name = %key.name,
                "ManagedService is being deleted, leaving dependents to garbage collection"
            );
            return Ok(("absent", Requeue::None));
        }

        info!(
            namespace = %key.namespace,
            name = %key.name,
            generation = ?resource.metadata.generation,
            service_type = ?resource.spec.service_type,
            "Reconciling ManagedService"
        );

        let updater = |outcome: ReconcileOutcome| {
            ManagedServiceStatusUpdater::new(outcome)
                .observed_generation(resource.metadata.generation)
        };

        // Invalid specs are permanent until edited
        let errors = validate_spec(&resource.spec);
        if !errors.is_empty() {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            warn!(
                namespace = %key.namespace,
                name = %key.name,
                %message,
                "Invalid ManagedService spec"
            );
            let outcome = ReconcileOutcome::InvalidSpec { message };
            if !self.write_status(key, &resource, updater(outcome)).await? {
                return Ok(("failed", Requeue::Backoff));
            }
            return Ok(("invalid", Requeue::None));
        }

        let secret = match self.fetch_secret(&resource).await {
            Ok(SecretLookup::NotReferenced) => None,
            Ok(SecretLookup::Found(secret)) => Some(secret),
            Ok(SecretLookup::Missing(name)) => {
                warn!(
                    namespace = %key.namespace,
                    name = %key.name,
                    secret = %name,
                    "Credential secret not found, will retry"
                );
                let outcome = ReconcileOutcome::SecretMissing {
                    message: format!(
                        "credential secret {name} not found in namespace {}",
                        key.namespace
                    ),
                };
                self.write_status(key, &resource, updater(outcome)).await?;
                return Ok(("failed", Requeue::Backoff));
            }
            Err(e) if e.is_recoverable() => {
                let outcome = ReconcileOutcome::DependentFailed {
                    message: format!("reading credential secret: {e}"),
                };
                self.write_status(key, &resource, updater(outcome)).await?;
                return Ok(("failed", Requeue::Backoff));
            }
            Err(e) => return Err(cluster_error(key, ReconcileStage::FetchSecret, e)),
        };

        let dependents = compose(&resource, secret.as_ref());
        let owner_uid = resource.metadata.uid.clone().unwrap_or_default();
        let mut report = PassReport::default();
        let mut desired_keys = BTreeSet::new();

        for dependent in &dependents {
            let dependent_key = dependent.key();
            desired_keys.insert(dependent_key.clone());

            let desired = dependent
                .to_dynamic(&self.registry)
                .map_err(|e| cluster_error(key, ReconcileStage::Compose, e))?;

            match self.apply_dependent(&dependent_key, &desired, &owner_uid).await {
                Ok((action, live)) => {
                    if dependent.kind() == "Deployment" {
                        report.ready_replicas = Some(ready_replicas(live.as_ref()));
                    }
                    report.record(&dependent_key, action);
                }
                Err(e) => {
                    warn!(dependent = %dependent_key, error = %e, "Failed to apply dependent");
                    report.fail(&dependent_key, e);
                }
            }
        }

        self.prune(&resource, &owner_uid, &desired_keys, &mut report)
            .await;

        let outcome = report.outcome();
        let status = updater(outcome.clone()).image(resolve_image(&resource));
        let status = match report.ready_replicas {
            Some(ready) => status.ready_replicas(ready),
            None => status,
        };
        let status_stored = self.write_status(key, &resource, status).await?;

        if let Some((dependent, source)) = report.fatal {
            error!(
                namespace = %key.namespace,
                name = %key.name,
                dependent = %dependent,
                error = %source,
                "Unrecoverable error applying dependents"
            );
            return Err(cluster_error(key, ReconcileStage::ApplyDependents, source));
        }
        if !status_stored {
            return Ok(("failed", Requeue::Backoff));
        }

        Ok(match outcome {
            ReconcileOutcome::DependentFailed { .. } => ("failed", Requeue::Backoff),
            ReconcileOutcome::DependentConflict { .. } => ("conflict", Requeue::None),
            ReconcileOutcome::Progressing { .. } => ("progressing", Requeue::None),
            _ => ("converged", Requeue::None),
        })
    }

    async fn fetch_secret(&self, resource: &ManagedService) -> Result<SecretLookup, ClusterError> {
        let Some(name) = resource
            .spec
            .connection_properties
            .as_ref()
            .and_then(|p| p.credential_secret_name())
        else {
            return Ok(SecretLookup::NotReferenced);
        };

        let key = ObjectKey::of::<Secret>(resource.namespace().unwrap_or_default(), name);
        match self.client.get(&key).await? {
            Some(object) => Ok(SecretLookup::Found(self.registry.decode(object)?)),
            None => Ok(SecretLookup::Missing(name.to_string())),
        }
    }

    /// Bring one dependent in line with its desired form.
    async fn apply_dependent(
        &self,
        key: &ObjectKey,
        desired: &DynamicObject,
        owner_uid: &str,
    ) -> Result<(DependentAction, Option<DynamicObject>), ClusterError> {
        let Some(live) = self.client.get(key).await? else {
            let created = self.client.create(desired).await?;
            metrics::record_dependent_write(&key.type_key.kind, "create");
            info!(dependent = %key, "Created dependent");
            return Ok((DependentAction::Created, Some(created)));
        };

        if !is_owned_by(&live, owner_uid) {
            let owner = controller_owner(&live.metadata)
                .map(|r| format!("{} {}", r.kind, r.name));
            warn!(dependent = %key, owner = ?owner, "Refusing to adopt existing object");
            return Ok((DependentAction::Refused { owner }, Some(live)));
        }

        if !needs_update(desired, &live) {
            debug!(dependent = %key, "Dependent in sync");
            return Ok((DependentAction::Unchanged, Some(live)));
        }

        let updated = self.client.update(&merge_onto_live(desired, &live)).await?;
        metrics::record_dependent_write(&key.type_key.kind, "update");
        info!(dependent = %key, "Updated drifted dependent");
        Ok((DependentAction::Updated, Some(updated)))
    }

    /// Delete owned dependents that are no longer desired.
    async fn prune(
        &self,
        resource: &ManagedService,
        owner_uid: &str,
        desired: &BTreeSet<ObjectKey>,
        report: &mut PassReport,
    ) {
        let namespace = resource.namespace().unwrap_or_default();
        let selector = dependent_selector(resource);

        for type_key in dependent_type_keys() {
            let existing = match self.client.list(&type_key, &namespace, &selector).await {
                Ok(existing) => existing,
                Err(e) => {
                    let key = ObjectKey::new(type_key.clone(), namespace.clone(), "*");
                    report.fail(&key, e);
                    continue;
                }
            };

            for object in existing {
                if !is_owned_by(&object, owner_uid) {
                    continue;
                }
                let Ok(key) = ObjectKey::from_object(&object) else {
                    continue;
                };
                if desired.contains(&key) {
                    continue;
                }

                match self.client.delete(&key).await {
                    Ok(()) => {
                        metrics::record_dependent_write(&key.type_key.kind, "delete");
                        info!(dependent = %key, "Pruned dependent no longer desired");
                        report.record(&key, DependentAction::Deleted);
                    }
                    Err(e) => report.fail(&key, e),
                }
            }
        }
    }

    /// Persist the status computed by `updater`.
    ///
    /// Returns `false` when a recoverable error left the stored status behind; the
    /// caller must then requeue with backoff.
    async fn write_status(
        &self,
        key: &ResourceKey,
        resource: &ManagedService,
        updater: ManagedServiceStatusUpdater,
    ) -> Result<bool, ReconcileError> {
        match updater
            .apply(self.client.as_ref(), &self.registry, resource)
            .await
        {
            Ok(_) => Ok(true),
            Err(ReconcileError::Cluster { source, .. }) if source.is_recoverable() => {
                warn!(resource = %key, error = %source, "Status update failed, will retry");
                metrics::record_error(source.metric_label());
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

enum SecretLookup {
    NotReferenced,
    Found(Secret),
    Missing(String),
}

fn ready_replicas(deployment: Option<&DynamicObject>) -> i32 {
    deployment
        .and_then(|d| d.data.get("status"))
        .and_then(|s| s.get("readyReplicas"))
        .and_then(serde_json::Value::as_i64)
        .and_then(|r| i32::try_from(r).ok())
        .unwrap_or(0)
}

fn cluster_error(key: &ResourceKey, stage: ReconcileStage, source: ClusterError) -> ReconcileError {
    ReconcileError::Cluster {
        key: key.to_string(),
        stage,
        source,
    }
}

/// Requeue with backoff for recoverable errors, fail otherwise.
fn recover(
    key: &ResourceKey,
    stage: ReconcileStage,
    err: ClusterError,
) -> Result<(&'static str, Requeue), ReconcileError> {
    metrics::record_error(err.metric_label());
    if err.is_recoverable() {
        warn!(resource = %key, %stage, error = %err, "Recoverable cluster error, backing off");
        Ok(("failed", Requeue::Backoff))
    } else {
        Err(cluster_error(key, stage, err))
    }
}

#[cfg(test)]
#[path = "managed_service_tests.rs"]
mod managed_service_tests;
