// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Data grid connection environment for managed workloads.
//!
//! [`build_connection_env`] maps a resource's [`ConnectionProperties`] onto the
//! environment variables the service's Hot Rod client reads. The mapping is pure and
//! total: absent or empty fields simply suppress the corresponding variable.
//!
//! Output order is fixed so that the generated pod template is byte-identical across
//! reconciliations; any reordering would show up as a spurious diff and trigger a
//! rollout.
//!
//! Credentials are never copied into the pod spec. The username and password are
//! bound to keys of the referenced secret, so the kubelet resolves them at pod start.

use crate::constants::{
    DEFAULT_SASL_MECHANISM, DEFAULT_SECRET_PASSWORD_KEY, DEFAULT_SECRET_USERNAME_KEY,
    ENV_INFINISPAN_AUTH_REALM, ENV_INFINISPAN_CREDENTIAL_SECRET, ENV_INFINISPAN_PASSWORD,
    ENV_INFINISPAN_SASL_MECHANISM, ENV_INFINISPAN_SERVER_LIST, ENV_INFINISPAN_USERNAME,
    ENV_INFINISPAN_USE_AUTH, ENV_QUARKUS_INFINISPAN_SERVER_LIST,
};
use crate::crd::ConnectionProperties;
use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, Secret, SecretKeySelector};
use kube::ResourceExt;
use tracing::{debug, warn};

/// One environment variable of the workload container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnvVarDescriptor {
    /// A plain `name=value` pair.
    Literal {
        /// Variable name
        name: String,
        /// Variable value
        value: String,
    },
    /// A variable resolved by the kubelet from a secret key.
    SecretKeyRef {
        /// Variable name
        name: String,
        /// Secret in the pod's namespace
        secret_name: String,
        /// Key inside the secret
        key: String,
    },
}

impl EnvVarDescriptor {
    /// Create a literal descriptor.
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Literal {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Create a descriptor bound to `secret_name[key]`.
    pub fn secret_key_ref(
        name: impl Into<String>,
        secret_name: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self::SecretKeyRef {
            name: name.into(),
            secret_name: secret_name.into(),
            key: key.into(),
        }
    }

    /// Name of the variable.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Literal { name, .. } | Self::SecretKeyRef { name, .. } => name,
        }
    }
}

impl From<&EnvVarDescriptor> for EnvVar {
    fn from(descriptor: &EnvVarDescriptor) -> Self {
        match descriptor {
            EnvVarDescriptor::Literal { name, value } => EnvVar {
                name: name.clone(),
                value: Some(value.clone()),
                ..Default::default()
            },
            EnvVarDescriptor::SecretKeyRef {
                name,
                secret_name,
                key,
            } => EnvVar {
                name: name.clone(),
                value_from: Some(EnvVarSource {
                    secret_key_ref: Some(SecretKeySelector {
                        name: secret_name.clone(),
                        key: key.clone(),
                        optional: None,
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
        }
    }
}

/// Build the data grid connection environment.
///
/// # Rules
///
/// Applied in this fixed order:
///
/// 1. When `credentials.secretName` is set: username and password bound to the
///    secret (custom keys if given, else `user` / `password`), the secret name as a
///    literal, `INFINISPAN_USEAUTH=true`, then the SASL mechanism (explicit or `PLAIN`).
/// 2. Otherwise: `INFINISPAN_USEAUTH=false`; a non-empty URI adds the Quarkus and the
///    generic server list; a non-empty realm adds the auth realm; a non-empty SASL
///    mechanism adds it.
///
/// # Arguments
///
/// * `props` - Connection properties from the resource spec
/// * `secret` - The already fetched credential secret, if any. It is only inspected to
///   warn about missing keys; its values never reach the output.
///
/// # Example
///
/// ```rust
/// use steward::connection::{build_connection_env, EnvVarDescriptor};
/// use steward::crd::ConnectionProperties;
///
/// let env = build_connection_env(&ConnectionProperties::default(), None);
/// assert_eq!(env, vec![EnvVarDescriptor::literal("INFINISPAN_USEAUTH", "false")]);
/// ```
#[must_use]
pub fn build_connection_env(
    props: &ConnectionProperties,
    secret: Option<&Secret>,
) -> Vec<EnvVarDescriptor> {
    let mut env = Vec::new();

    if let Some(secret_name) = props.credential_secret_name() {
        let credentials = props.credentials.as_ref();
        let username_key = credentials
            .and_then(|c| non_empty(c.username_key.as_deref()))
            .unwrap_or(DEFAULT_SECRET_USERNAME_KEY);
        let password_key = credentials
            .and_then(|c| non_empty(c.password_key.as_deref()))
            .unwrap_or(DEFAULT_SECRET_PASSWORD_KEY);

        if let Some(secret) = secret {
            warn_on_missing_key(secret, username_key);
            warn_on_missing_key(secret, password_key);
        }

        env.push(EnvVarDescriptor::secret_key_ref(
            ENV_INFINISPAN_USERNAME,
            secret_name,
            username_key,
        ));
        env.push(EnvVarDescriptor::secret_key_ref(
            ENV_INFINISPAN_PASSWORD,
            secret_name,
            password_key,
        ));
        env.push(EnvVarDescriptor::literal(
            ENV_INFINISPAN_CREDENTIAL_SECRET,
            secret_name,
        ));
        env.push(EnvVarDescriptor::literal(ENV_INFINISPAN_USE_AUTH, "true"));

        let mechanism =
            non_empty(props.sasl_mechanism.as_deref()).unwrap_or(DEFAULT_SASL_MECHANISM);
        env.push(EnvVarDescriptor::literal(
            ENV_INFINISPAN_SASL_MECHANISM,
            mechanism,
        ));
    } else {
        env.push(EnvVarDescriptor::literal(ENV_INFINISPAN_USE_AUTH, "false"));

        if let Some(uri) = non_empty(props.uri.as_deref()) {
            env.push(EnvVarDescriptor::literal(
                ENV_QUARKUS_INFINISPAN_SERVER_LIST,
                uri,
            ));
            env.push(EnvVarDescriptor::literal(ENV_INFINISPAN_SERVER_LIST, uri));
        }
        if let Some(realm) = non_empty(props.auth_realm.as_deref()) {
            env.push(EnvVarDescriptor::literal(ENV_INFINISPAN_AUTH_REALM, realm));
        }
        if let Some(mechanism) = non_empty(props.sasl_mechanism.as_deref()) {
            env.push(EnvVarDescriptor::literal(
                ENV_INFINISPAN_SASL_MECHANISM,
                mechanism,
            ));
        }
    }

    debug!(
        variables = env.len(),
        authenticated = props.credential_secret_name().is_some(),
        "Built data grid connection environment"
    );

    env
}

/// Convert descriptors into container `EnvVar`s, preserving order.
#[must_use]
pub fn to_env_vars(descriptors: &[EnvVarDescriptor]) -> Vec<EnvVar> {
    descriptors.iter().map(EnvVar::from).collect()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn warn_on_missing_key(secret: &Secret, key: &str) {
    let in_data = secret.data.as_ref().is_some_and(|d| d.contains_key(key));
    let in_string_data = secret
        .string_data
        .as_ref()
        .is_some_and(|d| d.contains_key(key));

    if !in_data && !in_string_data {
        warn!(
            secret = %secret.name_any(),
            key = %key,
            "Credential secret has no such key; pods will fail to start until it is added"
        );
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod connection_tests;
