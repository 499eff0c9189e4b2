// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Event dispatch: watches, work queue and reconcile workers.
//!
//! Change events for `ManagedService` resources enqueue their key directly. Events for
//! the dependents (Deployments, Services, ConfigMaps labelled as managed by Steward)
//! enqueue the key of the `ManagedService` that controls them. A periodic resync
//! enqueues every `ManagedService` so drift without an event is repaired eventually.
//!
//! A fixed pool of workers pulls keys from the shared [`WorkQueue`]. The queue never
//! hands the same key to two workers, so passes for one resource are serialized while
//! different resources reconcile in parallel.

use crate::cluster::{KubeClusterClient, TypeRegistry};
use crate::config::OperatorConfig;
use crate::constants::{API_GROUP_VERSION, KIND_MANAGED_SERVICE};
use crate::crd::ManagedService;
use crate::errors::ReconcileError;
use crate::labels::{K8S_MANAGED_BY, MANAGED_BY_STEWARD};
use crate::metrics;
use crate::queue::WorkQueue;
use crate::reconcilers::diff::controller_owner;
use crate::reconcilers::{ReconciliationEngine, Requeue, ResourceKey};
use crate::server::ServerState;
use anyhow::{Context, Result};
use futures::{future, StreamExt};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::api::ListParams;
use kube::core::ObjectMeta;
use kube::runtime::watcher::Config;
use kube::runtime::{metadata_watcher, watcher, WatchStreamExt};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Key of the `ManagedService` controlling a dependent, if any.
#[must_use]
pub fn owner_key(metadata: &ObjectMeta) -> Option<ResourceKey> {
    let owner = controller_owner(metadata)?;
    if owner.kind != KIND_MANAGED_SERVICE || owner.api_version != API_GROUP_VERSION {
        return None;
    }
    let namespace = metadata.namespace.clone()?;
    Some(ResourceKey::new(namespace, owner.name.clone()))
}

/// Pulls keys from the queue and reconciles them.
pub struct Dispatcher {
    engine: Arc<ReconciliationEngine>,
    queue: Arc<WorkQueue<ResourceKey>>,
}

impl Dispatcher {
    /// Create a dispatcher feeding `engine` from `queue`.
    #[must_use]
    pub fn new(engine: Arc<ReconciliationEngine>, queue: Arc<WorkQueue<ResourceKey>>) -> Self {
        Self { engine, queue }
    }

    /// Queue shared with the watchers.
    #[must_use]
    pub fn queue(&self) -> &Arc<WorkQueue<ResourceKey>> {
        &self.queue
    }

    /// Reconcile the next key.
    ///
    /// Waits for a key; returns `false` once the queue is shut down.
    pub async fn process_next(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };
        metrics::set_queue_depth(self.queue.len());

        let result = self.engine.reconcile(&key).await;
        self.queue.done(&key);
        self.handle_result(&key, result);
        true
    }

    fn handle_result(&self, key: &ResourceKey, result: Result<Requeue, ReconcileError>) {
        match result {
            Ok(Requeue::None) => {
                self.queue.forget(key);
            }
            Ok(Requeue::After(delay)) => {
                self.queue.forget(key);
                metrics::record_requeue("after");
                debug!(resource = %key, delay_ms = delay.as_millis(), "Requeue scheduled");
                self.queue.add_after(key.clone(), delay);
            }
            Ok(Requeue::Backoff) => {
                metrics::record_requeue("backoff");
                let delay = self.queue.add_rate_limited(key.clone());
                debug!(resource = %key, delay_ms = delay.as_millis(), "Requeue with backoff");
            }
            Err(e) => {
                metrics::record_requeue("error");
                metrics::record_error(e.metric_label());
                let delay = self.queue.add_rate_limited(key.clone());
                error!(
                    resource = %key,
                    error = %e,
                    retry_in_ms = delay.as_millis(),
                    "Reconciliation failed"
                );
            }
        }
    }

    /// Run one worker until the queue shuts down.
    pub async fn run_worker(self: Arc<Self>, id: usize) {
        debug!(worker = id, "Worker started");
        while self.process_next().await {}
        debug!(worker = id, "Worker stopped");
    }
}

fn scoped_api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Enqueue every `ManagedService` that changes.
pub async fn watch_managed_services(
    client: Client,
    namespace: Option<String>,
    queue: Arc<WorkQueue<ResourceKey>>,
) {
    let api = scoped_api::<ManagedService>(client, namespace.as_deref());
    let stream = watcher(api, Config::default())
        .touched_objects()
        .default_backoff();
    futures::pin_mut!(stream);

    while let Some(event) = stream.next().await {
        match event {
            Ok(resource) => {
                let key =
                    ResourceKey::new(resource.namespace().unwrap_or_default(), resource.name_any());
                debug!(resource = %key, "ManagedService changed");
                queue.add(key);
            }
            Err(e) => warn!(error = %e, "ManagedService watch error, retrying"),
        }
    }
}

/// Enqueue the controlling `ManagedService` of every dependent of type `K` that changes.
pub async fn watch_dependents<K>(
    client: Client,
    namespace: Option<String>,
    queue: Arc<WorkQueue<ResourceKey>>,
) where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
{
    let kind = K::kind(&());
    let api = scoped_api::<K>(client, namespace.as_deref());
    let config = Config::default().labels(&format!("{K8S_MANAGED_BY}={MANAGED_BY_STEWARD}"));
    let stream = metadata_watcher(api, config)
        .touched_objects()
        .default_backoff();
    futures::pin_mut!(stream);

    while let Some(event) = stream.next().await {
        match event {
            Ok(object) => {
                if let Some(key) = owner_key(&object.metadata) {
                    debug!(
                        kind = %kind,
                        dependent = %object.name_any(),
                        resource = %key,
                        "Dependent changed"
                    );
                    queue.add(key);
                }
            }
            Err(e) => warn!(kind = %kind, error = %e, "Dependent watch error, retrying"),
        }
    }
}

/// Enqueue every `ManagedService` each `interval`.
pub async fn resync(
    client: Client,
    namespace: Option<String>,
    interval: Duration,
    queue: Arc<WorkQueue<ResourceKey>>,
) {
    let api = scoped_api::<ManagedService>(client, namespace.as_deref());
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The initial watch listing already covers the first round
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match api.list(&ListParams::default()).await {
            Ok(list) => {
                debug!(count = list.items.len(), "Periodic resync");
                for resource in list.items {
                    queue.add(ResourceKey::new(
                        resource.namespace().unwrap_or_default(),
                        resource.name_any(),
                    ));
                }
            }
            Err(e) => warn!(error = %e, "Periodic resync failed to list ManagedServices"),
        }
    }
}

/// Run watches and workers until `shutdown` completes.
///
/// `state` turns ready once the CRD answered and the watches and workers are
/// running, and not ready again when shutdown begins. On shutdown the queue stops
/// handing out keys, the watches are cancelled, and in-flight reconciles get
/// `config.shutdown_grace` to finish.
///
/// # Errors
///
/// Returns an error if the `ManagedService` CRD cannot be queried at startup.
pub async fn run(
    client: Client,
    config: OperatorConfig,
    state: Arc<ServerState>,
    shutdown: impl Future<Output = ()> + Send,
) -> Result<()> {
    let probe = scoped_api::<ManagedService>(client.clone(), config.namespace.as_deref());
    probe
        .list(&ListParams::default().limit(1))
        .await
        .context("ManagedService is not queryable; is the CRD installed?")?;

    let registry = Arc::new(TypeRegistry::with_defaults());
    let cluster = Arc::new(KubeClusterClient::new(
        client.clone(),
        registry.clone(),
        config.request_timeout,
    ));
    let engine = Arc::new(ReconciliationEngine::new(cluster, registry));
    let queue = Arc::new(WorkQueue::new(config.backoff.clone()));
    let dispatcher = Arc::new(Dispatcher::new(engine, queue.clone()));

    let namespace = config.namespace.clone();
    let mut watches: Vec<JoinHandle<()>> = vec![
        tokio::spawn(watch_managed_services(
            client.clone(),
            namespace.clone(),
            queue.clone(),
        )),
        tokio::spawn(watch_dependents::<Deployment>(
            client.clone(),
            namespace.clone(),
            queue.clone(),
        )),
        tokio::spawn(watch_dependents::<Service>(
            client.clone(),
            namespace.clone(),
            queue.clone(),
        )),
        tokio::spawn(watch_dependents::<ConfigMap>(
            client.clone(),
            namespace.clone(),
            queue.clone(),
        )),
    ];
    if let Some(interval) = config.resync_interval {
        watches.push(tokio::spawn(resync(
            client.clone(),
            namespace.clone(),
            interval,
            queue.clone(),
        )));
    }

    let workers: Vec<JoinHandle<()>> = (0..config.workers)
        .map(|id| tokio::spawn(Arc::clone(&dispatcher).run_worker(id)))
        .collect();

    info!(
        workers = config.workers,
        namespace = namespace.as_deref().unwrap_or("<all>"),
        "Steward controller running"
    );
    state.set_ready(true);

    shutdown.await;
    state.set_ready(false);
    info!("Shutdown requested, draining workers");

    queue.shutdown();
    for watch in &watches {
        watch.abort();
    }

    if tokio::time::timeout(config.shutdown_grace, future::join_all(workers))
        .await
        .is_err()
    {
        warn!(
            grace_secs = config.shutdown_grace.as_secs(),
            "Workers did not finish within the shutdown grace period"
        );
    }

    info!("Steward controller stopped");
    Ok(())
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
