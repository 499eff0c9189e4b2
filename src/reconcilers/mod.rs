// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of `ManagedService` resources.
//!
//! Steward follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - Changes to `ManagedService` resources and their dependents enqueue
//!    the owning resource's key
//! 2. **Reconcile** - Compare desired state (CRD spec) with the live dependents
//! 3. **Update** - Create, update or prune dependents until they match
//! 4. **Status** - Report the result through the `Ready` condition and the phase
//!
//! # Modules
//!
//! - [`managed_service`] - The [`ReconciliationEngine`]
//! - [`status`] - Condition bookkeeping and the status updater
//! - [`diff`] - Semantic comparison of desired and live objects
//! - [`validation`] - Spec validation
//! - [`retry`] - Failure backoff policy
//!
//! # Example: Reconciling One Resource
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use steward::cluster::{InMemoryCluster, TypeRegistry};
//! use steward::reconcilers::{ReconciliationEngine, Requeue, ResourceKey};
//!
//! # async fn example() -> Result<(), steward::errors::ReconcileError> {
//! let engine = ReconciliationEngine::new(
//!     Arc::new(InMemoryCluster::new()),
//!     Arc::new(TypeRegistry::with_defaults()),
//! );
//!
//! let requeue = engine.reconcile(&ResourceKey::new("processes", "data-index")).await?;
//! assert_eq!(requeue, Requeue::None);
//! # Ok(())
//! # }
//! ```

pub mod diff;
pub mod managed_service;
pub mod retry;
pub mod status;
pub mod validation;

pub use managed_service::ReconciliationEngine;

use std::fmt;
use std::time::Duration;

/// Identifies a `ManagedService` in the work queue.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    /// Namespace of the resource
    pub namespace: String,
    /// Name of the resource
    pub name: String,
}

impl ResourceKey {
    /// Create a key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// What the queue should do with a key after a reconcile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requeue {
    /// Nothing to do until the next change event or resync.
    None,
    /// Reconcile again after a fixed delay.
    After(Duration),
    /// Reconcile again after the key's failure backoff.
    Backoff,
}
