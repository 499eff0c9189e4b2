// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Validation of `ManagedService` specs.
//!
//! Invalid specs are a permanent failure: the engine reports them through the `Ready`
//! condition and does not requeue until the spec changes.

use crate::constants::SUPPORTED_SASL_MECHANISMS;
use crate::crd::{ConnectionProperties, ManagedServiceSpec};
use crate::errors::ValidationError;

/// Validate a spec, returning every problem found.
#[must_use]
pub fn validate_spec(spec: &ManagedServiceSpec) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(replicas) = spec.replicas {
        if replicas < 0 {
            errors.push(ValidationError::new(
                "spec.replicas",
                format!("must not be negative, got {replicas}"),
            ));
        }
    }

    if let Some(port) = spec.http_port {
        if !(1..=65535).contains(&port) {
            errors.push(ValidationError::new(
                "spec.httpPort",
                format!("must be between 1 and 65535, got {port}"),
            ));
        }
    }

    if let Some(props) = &spec.connection_properties {
        validate_connection(props, &mut errors);
    }

    if let Some(properties) = &spec.properties {
        for key in properties.keys() {
            // Separators are escaped on rendering; control characters never belong in a name
            if key.trim().is_empty() || key.chars().any(char::is_control) {
                errors.push(ValidationError::new(
                    "spec.properties",
                    format!("invalid property name {key:?}"),
                ));
            }
        }
    }

    errors
}

fn validate_connection(props: &ConnectionProperties, errors: &mut Vec<ValidationError>) {
    if let Some(uri) = props.uri.as_deref().filter(|u| !u.is_empty()) {
        for entry in uri.split(',') {
            if let Err(reason) = validate_server(entry.trim()) {
                errors.push(ValidationError::new(
                    "spec.connectionProperties.uri",
                    format!("{entry:?}: {reason}"),
                ));
            }
        }
    }

    if let Some(mechanism) = props.sasl_mechanism.as_deref().filter(|m| !m.is_empty()) {
        if !SUPPORTED_SASL_MECHANISMS.contains(&mechanism) {
            errors.push(ValidationError::new(
                "spec.connectionProperties.saslMechanism",
                format!(
                    "unsupported mechanism {mechanism:?}, expected one of {}",
                    SUPPORTED_SASL_MECHANISMS.join(", ")
                ),
            ));
        }
    }

    if let Some(credentials) = &props.credentials {
        let has_keys = credentials.username_key.as_deref().is_some_and(|k| !k.is_empty())
            || credentials.password_key.as_deref().is_some_and(|k| !k.is_empty());
        if has_keys && props.credential_secret_name().is_none() {
            errors.push(ValidationError::new(
                "spec.connectionProperties.credentials.secretName",
                "required when usernameKey or passwordKey is set",
            ));
        }
    }
}

/// Check one `host[:port]` entry. IPv6 hosts must be bracketed (`[::1]:11222`).
fn validate_server(entry: &str) -> Result<(), String> {
    if entry.is_empty() {
        return Err("empty server entry".to_string());
    }

    let (host, port) = if let Some(rest) = entry.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| "unterminated IPv6 address".to_string())?;
        match after {
            "" => (host, None),
            _ => (
                host,
                Some(
                    after
                        .strip_prefix(':')
                        .ok_or_else(|| "expected ':' after IPv6 address".to_string())?,
                ),
            ),
        }
    } else {
        match entry.split_once(':') {
            Some((_, port)) if port.contains(':') => {
                return Err("IPv6 addresses must be enclosed in brackets".to_string())
            }
            Some((host, port)) => (host, Some(port)),
            None => (entry, None),
        }
    };

    if host.is_empty() {
        return Err("empty host".to_string());
    }
    if host.contains(char::is_whitespace) {
        return Err("host contains whitespace".to_string());
    }
    if let Some(port) = port {
        match port.parse::<u16>() {
            Ok(p) if p > 0 => {}
            _ => return Err(format!("invalid port {port:?}")),
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod validation_tests;
