// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Standard Kubernetes status condition types and reasons for `ManagedService`.
//!
//! Reasons are programmatic identifiers in CamelCase that explain why a condition has
//! a particular status.
//!
//! # Condition Types
//!
//! Every `ManagedService` carries a single encompassing `type: Ready` condition.
//! Its reason distinguishes the failure classes the operator can observe:
//!
//! ```yaml
//! status:
//!   phase: Degraded
//!   conditions:
//!     - type: Ready
//!       status: "False"
//!       reason: DependentFailed
//!       message: "Deployment processes/data-index: request timed out after 10s"
//! ```

// ============================================================================
// Condition Types
// ============================================================================

/// Encompassing readiness condition.
pub const CONDITION_TYPE_READY: &str = "Ready";

// ============================================================================
// Condition Status Values
// ============================================================================

/// The condition holds.
pub const CONDITION_STATUS_TRUE: &str = "True";

/// The condition does not hold.
pub const CONDITION_STATUS_FALSE: &str = "False";

// ============================================================================
// Reasons
// ============================================================================

/// Every dependent object matches the desired state.
pub const REASON_ALL_DEPENDENTS_READY: &str = "AllDependentsReady";

/// Dependents were created, updated or pruned in this pass and have not been
/// observed in their final state yet.
pub const REASON_DEPENDENTS_PROGRESSING: &str = "DependentsProgressing";

/// A dependent object could not be created, updated or deleted.
///
/// Recoverable: the resource is requeued with backoff.
pub const REASON_DEPENDENT_FAILED: &str = "DependentFailed";

/// An object with a dependent's name exists but is not owned by this resource.
///
/// The operator refuses to adopt it. The user must delete or rename the object.
pub const REASON_DEPENDENT_CONFLICT: &str = "DependentConflict";

/// The referenced credential secret does not exist.
///
/// Recoverable: the resource is requeued with backoff until the secret appears.
pub const REASON_CREDENTIAL_SECRET_NOT_FOUND: &str = "CredentialSecretNotFound";

/// The spec failed validation.
///
/// Permanent until the spec changes; only periodic resync retries it.
pub const REASON_INVALID_SPEC: &str = "InvalidSpec";
