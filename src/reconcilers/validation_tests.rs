// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `validation.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{ConnectionProperties, ManagedServiceSpec, SecretCredentials};
    use crate::reconcilers::validation::validate_spec;
    use std::collections::BTreeMap;

    fn with_uri(uri: &str) -> ManagedServiceSpec {
        ManagedServiceSpec {
            connection_properties: Some(ConnectionProperties {
                uri: Some(uri.into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn fields(spec: &ManagedServiceSpec) -> Vec<String> {
        validate_spec(spec).into_iter().map(|e| e.field).collect()
    }

    #[test]
    fn test_default_spec_is_valid() {
        assert!(validate_spec(&ManagedServiceSpec::default()).is_empty());
    }

    #[test]
    fn test_negative_replicas_rejected() {
        let spec = ManagedServiceSpec {
            replicas: Some(-1),
            ..Default::default()
        };

        assert_eq!(fields(&spec), vec!["spec.replicas"]);
    }

    #[test]
    fn test_zero_replicas_allowed() {
        let spec = ManagedServiceSpec {
            replicas: Some(0),
            ..Default::default()
        };

        assert!(validate_spec(&spec).is_empty());
    }

    #[test]
    fn test_http_port_range() {
        for port in [0, 65536, -80] {
            let spec = ManagedServiceSpec {
                http_port: Some(port),
                ..Default::default()
            };
            assert_eq!(fields(&spec), vec!["spec.httpPort"], "port {port}");
        }
    }

    #[test]
    fn test_valid_server_lists() {
        for uri in [
            "infinispan",
            "infinispan:11222",
            "a:1, b:2,c",
            "[::1]:11222",
            "[fd00::1]",
        ] {
            assert!(validate_spec(&with_uri(uri)).is_empty(), "uri {uri}");
        }
    }

    #[test]
    fn test_invalid_server_lists() {
        for uri in [
            "host:0",
            "host:70000",
            "host:abc",
            ":11222",
            "a:1,,b:2",
            "::1",
            "[::1",
            "[::1]x",
        ] {
            assert_eq!(
                fields(&with_uri(uri)),
                vec!["spec.connectionProperties.uri"],
                "uri {uri}"
            );
        }
    }

    #[test]
    fn test_empty_uri_is_absent() {
        assert!(validate_spec(&with_uri("")).is_empty());
    }

    #[test]
    fn test_sasl_mechanism_must_be_supported() {
        let supported = ManagedServiceSpec {
            connection_properties: Some(ConnectionProperties {
                sasl_mechanism: Some("SCRAM-SHA-512".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let unsupported = ManagedServiceSpec {
            connection_properties: Some(ConnectionProperties {
                sasl_mechanism: Some("MAGIC".into()),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert!(validate_spec(&supported).is_empty());
        assert_eq!(
            fields(&unsupported),
            vec!["spec.connectionProperties.saslMechanism"]
        );
    }

    #[test]
    fn test_credential_keys_require_secret_name() {
        let spec = ManagedServiceSpec {
            connection_properties: Some(ConnectionProperties {
                credentials: Some(SecretCredentials {
                    username_key: Some("login".into()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(
            fields(&spec),
            vec!["spec.connectionProperties.credentials.secretName"]
        );
    }

    #[test]
    fn test_invalid_property_names() {
        let spec = ManagedServiceSpec {
            properties: Some(BTreeMap::from([
                ("ok.key".into(), "v".into()),
                ("bad\nkey".into(), "v".into()),
                ("bad\rkey".into(), "v".into()),
                ("tab\tkey".into(), "v".into()),
                (" ".into(), "v".into()),
            ])),
            ..Default::default()
        };

        assert_eq!(validate_spec(&spec).len(), 4);
    }

    #[test]
    fn test_property_names_with_separators_are_valid() {
        let spec = ManagedServiceSpec {
            properties: Some(BTreeMap::from([
                ("a=b".into(), "v".into()),
                ("a:b".into(), "v".into()),
                ("#comment".into(), "v".into()),
                ("!bang".into(), "v".into()),
                ("with space".into(), "multi\nline value".into()),
            ])),
            ..Default::default()
        };

        assert!(validate_spec(&spec).is_empty());
    }

    #[test]
    fn test_all_errors_reported() {
        let spec = ManagedServiceSpec {
            replicas: Some(-2),
            http_port: Some(0),
            connection_properties: Some(ConnectionProperties {
                uri: Some("host:abc".into()),
                sasl_mechanism: Some("NOPE".into()),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(validate_spec(&spec).len(), 4);
    }
}
