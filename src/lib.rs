// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Steward - Managed Service Operator for Kubernetes
//!
//! Steward reconciles `ManagedService` custom resources into the workload that runs
//! them: a Deployment, a Service and, when application properties are given, a
//! ConfigMap. Services that store data in an Infinispan data grid get their
//! connection settings wired in as environment variables, with credentials taken
//! from a referenced Secret.
//!
//! ## Modules
//!
//! - [`crd`] - The `ManagedService` custom resource
//! - [`connection`] - Data grid connection environment
//! - [`resources`] - Composition of the desired dependents
//! - [`reconcilers`] - The reconciliation engine, status and diff logic
//! - [`cluster`] - Cluster access behind the [`cluster::ClusterClient`] trait
//! - [`queue`] - Deduplicating work queue with failure backoff
//! - [`controller`] - Watches, resync and reconcile workers
//! - [`config`] - Operator configuration
//! - [`metrics`] / [`server`] - Prometheus metrics and probe endpoint
//!
//! ## Example
//!
//! ```rust,no_run
//! use steward::crd::{ManagedService, ManagedServiceSpec, ServiceType};
//!
//! let resource = ManagedService::new(
//!     "data-index",
//!     ManagedServiceSpec {
//!         service_type: ServiceType::DataIndex,
//!         replicas: Some(2),
//!         ..Default::default()
//!     },
//! );
//! ```

pub mod cluster;
pub mod config;
pub mod connection;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod errors;
pub mod labels;
pub mod metrics;
pub mod queue;
pub mod reconcilers;
pub mod resources;
pub mod server;
pub mod status_reasons;
