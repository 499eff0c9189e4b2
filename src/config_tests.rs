// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `config.rs`

#[cfg(test)]
mod tests {
    use crate::config::{OperatorArgs, OperatorConfig};
    use clap::Parser;
    use std::time::Duration;

    fn parse(args: &[&str]) -> anyhow::Result<OperatorConfig> {
        let args =
            OperatorArgs::try_parse_from(std::iter::once("steward").chain(args.iter().copied()))?;
        OperatorConfig::try_from(args)
    }

    #[test]
    fn test_defaults_match_default_config() {
        let config = parse(&[]).unwrap();

        assert_eq!(config, OperatorConfig::default());
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = parse(&[
            "--workers",
            "8",
            "--request-timeout-secs",
            "3",
            "--backoff-base-millis",
            "250",
            "--backoff-max-secs",
            "60",
            "--namespace",
            "processes",
            "--metrics-bind-address",
            "127.0.0.1:9090",
        ])
        .unwrap();

        assert_eq!(config.workers, 8);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.backoff.initial_interval, Duration::from_millis(250));
        assert_eq!(config.backoff.max_interval, Duration::from_secs(60));
        assert_eq!(config.namespace.as_deref(), Some("processes"));
        assert_eq!(config.metrics_bind_address.port(), 9090);
    }

    #[test]
    fn test_zero_resync_disables_resync() {
        let config = parse(&["--resync-interval-secs", "0"]).unwrap();

        assert!(config.resync_interval.is_none());
    }

    #[test]
    fn test_empty_namespace_means_all() {
        let config = parse(&["--namespace", ""]).unwrap();

        assert!(config.namespace.is_none());
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(parse(&["--workers", "0"]).is_err());
    }

    #[test]
    fn test_backoff_max_below_base_rejected() {
        assert!(parse(&["--backoff-base-millis", "5000", "--backoff-max-secs", "1"]).is_err());
    }

    #[test]
    fn test_invalid_bind_address_rejected() {
        let err = parse(&["--metrics-bind-address", "not-an-address"]).unwrap_err();

        assert!(err.to_string().contains("invalid metrics bind address"));
    }
}
