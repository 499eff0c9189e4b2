// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration.
//!
//! Every setting can be passed as a flag or through the environment, e.g.
//! `--workers 8` or `STEWARD_WORKERS=8`. [`OperatorArgs`] is the parsed command line;
//! [`OperatorConfig`] is the typed configuration the rest of the operator uses.

use crate::constants::{
    DEFAULT_BACKOFF_BASE_MILLIS, DEFAULT_BACKOFF_MAX_SECS, DEFAULT_METRICS_BIND_ADDRESS,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RESYNC_INTERVAL_SECS, DEFAULT_SHUTDOWN_GRACE_SECS,
    DEFAULT_WORKER_COUNT,
};
use crate::reconcilers::retry::ExponentialBackoff;
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Steward operator command line.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "steward",
    version,
    about = "Kubernetes operator for ManagedService resources"
)]
pub struct OperatorArgs {
    /// Number of concurrent reconcile workers
    #[arg(long, env = "STEWARD_WORKERS", default_value_t = DEFAULT_WORKER_COUNT)]
    pub workers: usize,

    /// Deadline for a single cluster API call, in seconds
    #[arg(
        long,
        env = "STEWARD_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS
    )]
    pub request_timeout_secs: u64,

    /// Interval between full resyncs of every ManagedService, in seconds (0 disables)
    #[arg(
        long,
        env = "STEWARD_RESYNC_INTERVAL_SECS",
        default_value_t = DEFAULT_RESYNC_INTERVAL_SECS
    )]
    pub resync_interval_secs: u64,

    /// Backoff after the first failed reconcile, in milliseconds
    #[arg(
        long,
        env = "STEWARD_BACKOFF_BASE_MILLIS",
        default_value_t = DEFAULT_BACKOFF_BASE_MILLIS
    )]
    pub backoff_base_millis: u64,

    /// Upper bound of the failure backoff, in seconds
    #[arg(
        long,
        env = "STEWARD_BACKOFF_MAX_SECS",
        default_value_t = DEFAULT_BACKOFF_MAX_SECS
    )]
    pub backoff_max_secs: u64,

    /// Time allowed for in-flight reconciles to finish on shutdown, in seconds
    #[arg(
        long,
        env = "STEWARD_SHUTDOWN_GRACE_SECS",
        default_value_t = DEFAULT_SHUTDOWN_GRACE_SECS
    )]
    pub shutdown_grace_secs: u64,

    /// Address of the metrics and health endpoint
    #[arg(
        long,
        env = "STEWARD_METRICS_BIND_ADDRESS",
        default_value = DEFAULT_METRICS_BIND_ADDRESS
    )]
    pub metrics_bind_address: String,

    /// Only watch this namespace (default: all namespaces)
    #[arg(long, env = "STEWARD_NAMESPACE")]
    pub namespace: Option<String>,
}

/// Validated operator configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorConfig {
    /// Number of concurrent reconcile workers
    pub workers: usize,
    /// Deadline for a single cluster API call
    pub request_timeout: Duration,
    /// Interval between full resyncs; `None` disables resync
    pub resync_interval: Option<Duration>,
    /// Failure backoff policy
    pub backoff: ExponentialBackoff,
    /// Time allowed for in-flight reconciles on shutdown
    pub shutdown_grace: Duration,
    /// Address of the metrics and health endpoint
    pub metrics_bind_address: SocketAddr,
    /// Namespace restriction
    pub namespace: Option<String>,
}

impl TryFrom<OperatorArgs> for OperatorConfig {
    type Error = anyhow::Error;

    fn try_from(args: OperatorArgs) -> Result<Self> {
        if args.workers == 0 {
            bail!("--workers must be at least 1");
        }
        if args.request_timeout_secs == 0 {
            bail!("--request-timeout-secs must be at least 1");
        }
        if args.backoff_base_millis == 0 {
            bail!("--backoff-base-millis must be at least 1");
        }

        let backoff_base = Duration::from_millis(args.backoff_base_millis);
        let backoff_max = Duration::from_secs(args.backoff_max_secs);
        if backoff_max < backoff_base {
            bail!("--backoff-max-secs must not be smaller than --backoff-base-millis");
        }

        let metrics_bind_address = args
            .metrics_bind_address
            .parse()
            .with_context(|| {
                format!(
                    "invalid metrics bind address {}",
                    args.metrics_bind_address
                )
            })?;

        Ok(Self {
            workers: args.workers,
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            resync_interval: (args.resync_interval_secs > 0)
                .then(|| Duration::from_secs(args.resync_interval_secs)),
            backoff: ExponentialBackoff::new(backoff_base, backoff_max),
            shutdown_grace: Duration::from_secs(args.shutdown_grace_secs),
            metrics_bind_address,
            namespace: args.namespace.filter(|ns| !ns.is_empty()),
        })
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKER_COUNT,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            resync_interval: Some(Duration::from_secs(DEFAULT_RESYNC_INTERVAL_SECS)),
            backoff: ExponentialBackoff::default(),
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
            metrics_bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            namespace: None,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
