// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `resources.rs`

#[cfg(test)]
mod tests {
    use crate::constants::{
        APPLICATION_PROPERTIES_KEY, APPLICATION_PROPERTIES_MOUNT_PATH, DEFAULT_HTTP_PORT,
        ENV_INFINISPAN_USE_AUTH, KIND_MANAGED_SERVICE,
    };
    use crate::crd::{
        ConnectionProperties, ManagedService, ManagedServiceSpec, SecretCredentials, ServiceType,
    };
    use crate::labels::{
        CREDENTIALS_HASH_ANNOTATION, K8S_INSTANCE, PROPERTIES_HASH_ANNOTATION,
        STEWARD_SERVICE_LABEL,
    };
    use crate::resources::{
        build_owner_references, build_service, compose, dependent_selector, render_properties,
        resolve_image, DependentSpec,
    };
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    use k8s_openapi::ByteString;
    use kube::core::ObjectMeta;
    use std::collections::BTreeMap;

    fn resource(spec: ManagedServiceSpec) -> ManagedService {
        let mut resource = ManagedService::new("console", spec);
        resource.metadata.namespace = Some("test-ns".into());
        resource.metadata.uid = Some("uid-1".into());
        resource
    }

    fn secret(password: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some("creds".into()),
                namespace: Some("test-ns".into()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([
                ("user".to_string(), ByteString(b"admin".to_vec())),
                ("password".to_string(), ByteString(password.as_bytes().to_vec())),
            ])),
            ..Default::default()
        }
    }

    fn with_credentials() -> ManagedServiceSpec {
        ManagedServiceSpec {
            connection_properties: Some(ConnectionProperties {
                credentials: Some(SecretCredentials {
                    secret_name: Some("creds".into()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn deployment(dependents: &[DependentSpec]) -> &Deployment {
        dependents
            .iter()
            .find_map(|d| match d {
                DependentSpec::Deployment(d) => Some(d),
                _ => None,
            })
            .expect("deployment should be composed")
    }

    fn template_annotation<'a>(deployment: &'a Deployment, key: &str) -> &'a str {
        deployment
            .spec
            .as_ref()
            .and_then(|s| s.template.metadata.as_ref())
            .and_then(|m| m.annotations.as_ref())
            .and_then(|a| a.get(key))
            .map(String::as_str)
            .expect("annotation should be set")
    }

    #[test]
    fn test_compose_without_properties_yields_deployment_then_service() {
        let dependents = compose(&resource(ManagedServiceSpec::default()), None);

        let kinds: Vec<_> = dependents.iter().map(DependentSpec::kind).collect();
        assert_eq!(kinds, vec!["Deployment", "Service"]);
    }

    #[test]
    fn test_compose_with_properties_puts_configmap_first() {
        let spec = ManagedServiceSpec {
            properties: Some(BTreeMap::from([("b".into(), "2".into()), ("a".into(), "1".into())])),
            ..Default::default()
        };

        let dependents = compose(&resource(spec), None);

        let kinds: Vec<_> = dependents.iter().map(DependentSpec::kind).collect();
        assert_eq!(kinds, vec!["ConfigMap", "Deployment", "Service"]);
        let DependentSpec::ConfigMap(cm) = &dependents[0] else {
            panic!("first dependent should be the ConfigMap");
        };
        assert_eq!(cm.metadata.name.as_deref(), Some("console-properties"));
        assert_eq!(
            cm.data.as_ref().unwrap()[APPLICATION_PROPERTIES_KEY],
            "a=1\nb=2\n"
        );

        let pod = deployment(&dependents).spec.as_ref().unwrap().template.spec.as_ref().unwrap();
        let mounts = pod.containers[0].volume_mounts.as_ref().unwrap();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].mount_path, APPLICATION_PROPERTIES_MOUNT_PATH);
        assert_eq!(pod.volumes.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_properties_compose_no_configmap() {
        let spec = ManagedServiceSpec {
            properties: Some(BTreeMap::new()),
            ..Default::default()
        };

        let dependents = compose(&resource(spec), None);

        assert!(dependents.iter().all(|d| d.kind() != "ConfigMap"));
        let pod = deployment(&dependents).spec.as_ref().unwrap().template.spec.as_ref().unwrap();
        assert_eq!(pod.volumes.as_deref(), Some(&[][..]));
    }

    #[test]
    fn test_compose_is_deterministic() {
        let mut spec = with_credentials();
        spec.properties = Some(BTreeMap::from([("x".into(), "y".into())]));
        let resource = resource(spec);
        let secret = secret("pass");

        let first = serde_json::to_string(&deployment(&compose(&resource, Some(&secret)))).unwrap();
        let second =
            serde_json::to_string(&deployment(&compose(&resource, Some(&secret)))).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_container_env_is_connection_env() {
        let dependents = compose(&resource(ManagedServiceSpec::default()), None);

        let container = &deployment(&dependents)
            .spec
            .as_ref()
            .unwrap()
            .template
            .spec
            .as_ref()
            .unwrap()
            .containers[0];
        let env = container.env.as_ref().unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(env[0].name, ENV_INFINISPAN_USE_AUTH);
        assert_eq!(env[0].value.as_deref(), Some("false"));
    }

    #[test]
    fn test_secret_values_are_not_embedded() {
        let resource = resource(with_credentials());
        let secret = secret("hunter2");

        let serialized =
            serde_json::to_string(&deployment(&compose(&resource, Some(&secret)))).unwrap();

        assert!(!serialized.contains("hunter2"));
        assert!(!serialized.contains("admin"));
    }

    #[test]
    fn test_credentials_hash_changes_with_secret_data() {
        let resource = resource(with_credentials());

        let first = compose(&resource, Some(&secret("one")));
        let second = compose(&resource, Some(&secret("two")));

        let a = template_annotation(deployment(&first), CREDENTIALS_HASH_ANNOTATION);
        let b = template_annotation(deployment(&second), CREDENTIALS_HASH_ANNOTATION);
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn test_properties_hash_is_lowercase_sha256_hex() {
        let dependents = compose(
            &resource(ManagedServiceSpec {
                properties: Some(BTreeMap::from([("a".into(), "1".into())])),
                ..Default::default()
            }),
            None,
        );

        // sha256("application.properties\0a=1\n\0")
        assert_eq!(
            template_annotation(deployment(&dependents), PROPERTIES_HASH_ANNOTATION),
            "d072e994af71ed4ac19c15bcfdee5eeb9bbc7ae537aa7c96fc105246f0f286d1"
        );
    }

    #[test]
    fn test_hash_annotations_empty_without_inputs() {
        let dependents = compose(&resource(ManagedServiceSpec::default()), None);

        let deployment = deployment(&dependents);
        assert_eq!(template_annotation(deployment, CREDENTIALS_HASH_ANNOTATION), "");
        assert_eq!(template_annotation(deployment, PROPERTIES_HASH_ANNOTATION), "");
    }

    #[test]
    fn test_replicas_default_and_override() {
        let defaulted = compose(&resource(ManagedServiceSpec::default()), None);
        let scaled = compose(
            &resource(ManagedServiceSpec {
                replicas: Some(0),
                ..Default::default()
            }),
            None,
        );

        assert_eq!(deployment(&defaulted).spec.as_ref().unwrap().replicas, Some(1));
        assert_eq!(deployment(&scaled).spec.as_ref().unwrap().replicas, Some(0));
    }

    #[test]
    fn test_resolve_image() {
        let defaulted = resource(ManagedServiceSpec::default());
        let versioned = resource(ManagedServiceSpec {
            service_type: ServiceType::DataIndex,
            version: Some("1.2.3".into()),
            ..Default::default()
        });
        let overridden = resource(ManagedServiceSpec {
            image: Some("registry.local/console:dev".into()),
            version: Some("ignored".into()),
            ..Default::default()
        });

        assert_eq!(
            resolve_image(&defaulted),
            "quay.io/kiegroup/kogito-management-console:0.9.1"
        );
        assert_eq!(
            resolve_image(&versioned),
            "quay.io/kiegroup/kogito-data-index:1.2.3"
        );
        assert_eq!(resolve_image(&overridden), "registry.local/console:dev");
    }

    #[test]
    fn test_owner_reference_is_controller() {
        let refs = build_owner_references(&resource(ManagedServiceSpec::default()));

        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, KIND_MANAGED_SERVICE);
        assert_eq!(refs[0].name, "console");
        assert_eq!(refs[0].uid, "uid-1");
        assert_eq!(refs[0].controller, Some(true));
        assert_eq!(refs[0].block_owner_deletion, Some(true));
    }

    #[test]
    fn test_service_exposes_http_port() {
        let service = build_service(&resource(ManagedServiceSpec::default()));

        let spec = service.spec.unwrap();
        let ports = spec.ports.unwrap();
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
        assert_eq!(ports[0].port, DEFAULT_HTTP_PORT);
        assert_eq!(ports[0].target_port, Some(IntOrString::Int(DEFAULT_HTTP_PORT)));
        let selector = spec.selector.unwrap();
        assert_eq!(selector[K8S_INSTANCE], "console");
        assert_eq!(selector[STEWARD_SERVICE_LABEL], "console");
    }

    #[test]
    fn test_dependent_selector_and_keys() {
        let resource = resource(ManagedServiceSpec::default());

        let dependents = compose(&resource, None);

        assert_eq!(
            dependent_selector(&resource),
            "app.steward.dev/managed-service=console,app.kubernetes.io/managed-by=steward-operator"
        );
        let key = dependents[0].key();
        assert_eq!(key.namespace, "test-ns");
        assert_eq!(key.name, "console");
        assert_eq!(key.type_key.kind, "Deployment");
    }

    #[test]
    fn test_render_properties_sorted() {
        let properties = BTreeMap::from([
            ("quarkus.http.cors".to_string(), "true".to_string()),
            ("kogito.dataindex.url".to_string(), "http://data-index".to_string()),
        ]);

        assert_eq!(
            render_properties(&properties),
            "kogito.dataindex.url=http\\://data-index\nquarkus.http.cors=true\n"
        );
    }

    #[test]
    fn test_render_properties_escapes_separators_and_comments() {
        let properties = BTreeMap::from([
            ("#not.a.comment".to_string(), "a=b".to_string()),
            ("url:port".to_string(), " x:y ".to_string()),
            ("with space".to_string(), "line one\nline two\r\n".to_string()),
        ]);

        assert_eq!(
            render_properties(&properties),
            "\\#not.a.comment=a\\=b\n\
             url\\:port=\\ x\\:y \n\
             with\\ space=line one\\nline two\\r\\n\n"
        );
    }

    #[test]
    fn test_rendered_properties_load_back_unchanged() {
        let properties = BTreeMap::from([
            ("#comment".to_string(), "value".to_string()),
            ("!bang".to_string(), "trailing\\".to_string()),
            ("a=b".to_string(), "c=d".to_string()),
            ("a:b".to_string(), ":x".to_string()),
            ("with space".to_string(), "  leading spaces".to_string()),
            ("multi".to_string(), "line one\ninjected=true\r\n".to_string()),
            ("tab".to_string(), "\tx\x0cy".to_string()),
            ("bell".to_string(), "\u{7}ring".to_string()),
            ("unicode.key".to_string(), "grüße ✓".to_string()),
        ]);

        let rendered = render_properties(&properties);

        assert_eq!(rendered.lines().count(), properties.len());
        assert_eq!(load_properties(&rendered), properties);
    }

    /// Parse `key=value` text with `java.util.Properties.load` rules, minus line
    /// continuations.
    fn load_properties(text: &str) -> BTreeMap<String, String> {
        fn is_blank(c: &char) -> bool {
            matches!(c, ' ' | '\t' | '\x0c')
        }

        fn unescape(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> char {
            match chars.next() {
                Some('t') => '\t',
                Some('n') => '\n',
                Some('r') => '\r',
                Some('f') => '\x0c',
                Some('u') => {
                    let hex: String = chars.by_ref().take(4).collect();
                    char::from_u32(u32::from_str_radix(&hex, 16).unwrap()).unwrap()
                }
                Some(c) => c,
                None => panic!("dangling escape"),
            }
        }

        let mut loaded = BTreeMap::new();
        for line in text.lines() {
            let line = line.trim_start_matches([' ', '\t', '\x0c']);
            if line.is_empty() || line.starts_with(['#', '!']) {
                continue;
            }

            let mut chars = line.chars().peekable();
            let mut key = String::new();
            let mut separated = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => key.push(unescape(&mut chars)),
                    '=' | ':' => {
                        separated = true;
                        break;
                    }
                    c if is_blank(&c) => break,
                    c => key.push(c),
                }
            }
            while chars.next_if(is_blank).is_some() {}
            if !separated && chars.next_if(|c| matches!(c, '=' | ':')).is_some() {
                while chars.next_if(is_blank).is_some() {}
            }

            let mut value = String::new();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    value.push(unescape(&mut chars));
                } else {
                    value.push(c);
                }
            }
            loaded.insert(key, value);
        }
        loaded
    }
}
