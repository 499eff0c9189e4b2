// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Steward operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "app.steward.dev/v1alpha1";

/// Kind name for `ManagedService` resource
pub const KIND_MANAGED_SERVICE: &str = "ManagedService";

/// Field manager recorded on objects written by the operator
pub const FIELD_MANAGER: &str = "steward-controller";

// ============================================================================
// Data Grid Connection Environment Variables
// ============================================================================

/// Whether the client authenticates against the data grid
pub const ENV_INFINISPAN_USE_AUTH: &str = "INFINISPAN_USEAUTH";

/// Quarkus-specific server list consumed by the Quarkus Infinispan extension
pub const ENV_QUARKUS_INFINISPAN_SERVER_LIST: &str = "QUARKUS_INFINISPAN_CLIENT_SERVER_LIST";

/// Generic Hot Rod client server list
pub const ENV_INFINISPAN_SERVER_LIST: &str = "INFINISPAN_CLIENT_SERVER_LIST";

/// Authentication realm
pub const ENV_INFINISPAN_AUTH_REALM: &str = "INFINISPAN_AUTHREALM";

/// SASL mechanism
pub const ENV_INFINISPAN_SASL_MECHANISM: &str = "INFINISPAN_SASLMECHANISM";

/// Username (always bound to a secret key, never a literal)
pub const ENV_INFINISPAN_USERNAME: &str = "INFINISPAN_USERNAME";

/// Password (always bound to a secret key, never a literal)
pub const ENV_INFINISPAN_PASSWORD: &str = "INFINISPAN_PASSWORD";

/// Name of the secret holding the credentials
pub const ENV_INFINISPAN_CREDENTIAL_SECRET: &str = "INFINISPAN_CREDENTIAL_SECRET";

/// Default key holding the username inside the credential secret
pub const DEFAULT_SECRET_USERNAME_KEY: &str = "user";

/// Default key holding the password inside the credential secret
pub const DEFAULT_SECRET_PASSWORD_KEY: &str = "password";

/// SASL mechanism used when credentials are set but no mechanism is given
pub const DEFAULT_SASL_MECHANISM: &str = "PLAIN";

/// SASL mechanisms accepted by the Hot Rod client
pub const SUPPORTED_SASL_MECHANISMS: &[&str] = &[
    "PLAIN",
    "DIGEST-MD5",
    "SCRAM-SHA-1",
    "SCRAM-SHA-256",
    "SCRAM-SHA-384",
    "SCRAM-SHA-512",
    "EXTERNAL",
    "OAUTHBEARER",
    "GSSAPI",
];

// ============================================================================
// Workload Constants
// ============================================================================

/// Registry and organization for the service images
pub const DEFAULT_IMAGE_REGISTRY: &str = "quay.io/kiegroup";

/// Image tag used when the resource does not pin a version
pub const DEFAULT_IMAGE_VERSION: &str = "0.9.1";

/// Default replica count when the spec leaves it unset
pub const DEFAULT_REPLICAS: i32 = 1;

/// Default HTTP port served by every managed service
pub const DEFAULT_HTTP_PORT: i32 = 8080;

/// Name of the HTTP port on containers and services
pub const HTTP_PORT_NAME: &str = "http";

/// Name of the single container in each managed workload
pub const CONTAINER_NAME_SERVICE: &str = "service";

/// Key holding the rendered properties inside the properties `ConfigMap`
pub const APPLICATION_PROPERTIES_KEY: &str = "application.properties";

/// Mount path of the properties `ConfigMap`
pub const APPLICATION_PROPERTIES_MOUNT_PATH: &str = "/home/kogito/config";

/// Volume name of the properties `ConfigMap`
pub const VOLUME_APPLICATION_PROPERTIES: &str = "application-properties";

/// Suffix appended to the resource name for the properties `ConfigMap`
pub const PROPERTIES_CONFIGMAP_SUFFIX: &str = "-properties";

// ============================================================================
// Kubernetes Health Check Constants
// ============================================================================

/// Liveness probe initial delay
pub const LIVENESS_INITIAL_DELAY_SECS: i32 = 30;

/// Liveness probe period (how often to check)
pub const LIVENESS_PERIOD_SECS: i32 = 10;

/// Liveness probe timeout
pub const LIVENESS_TIMEOUT_SECS: i32 = 5;

/// Liveness probe failure threshold
pub const LIVENESS_FAILURE_THRESHOLD: i32 = 3;

/// Readiness probe initial delay
pub const READINESS_INITIAL_DELAY_SECS: i32 = 10;

/// Readiness probe period
pub const READINESS_PERIOD_SECS: i32 = 5;

/// Readiness probe timeout
pub const READINESS_TIMEOUT_SECS: i32 = 3;

/// Readiness probe failure threshold
pub const READINESS_FAILURE_THRESHOLD: i32 = 3;

// ============================================================================
// Controller Constants
// ============================================================================

/// Maximum attempts for a status write that keeps hitting optimistic-concurrency conflicts
pub const STATUS_UPDATE_MAX_ATTEMPTS: u32 = 3;

/// Default number of reconcile workers
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default deadline for a single cluster API call (10 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default interval between full resyncs of all resources (10 minutes)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 600;

/// Default first delay of the per-key failure backoff (1 second)
pub const DEFAULT_BACKOFF_BASE_MILLIS: u64 = 1000;

/// Default cap of the per-key failure backoff (5 minutes)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Backoff multiplier (exponential growth factor)
pub const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
pub const BACKOFF_RANDOMIZATION_FACTOR: f64 = 0.1;

/// Default time allowed for in-flight reconciliations on shutdown (30 seconds)
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Default bind address of the metrics and health HTTP server
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";
