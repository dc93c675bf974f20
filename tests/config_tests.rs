//! Unit tests for client configuration
//!
//! This test module verifies configuration defaults, the builder methods,
//! and the validation performed when a client is constructed.

use std::time::Duration;

use fastdfs::{AsyncTrackerClient, ClientConfig, FastDFSError, StorageClient, TrackerClient};

/// Test suite for configuration defaults and builders
mod builder_tests {
    use super::*;

    /// Test that a new configuration carries the documented defaults
    #[test]
    fn test_config_defaults() {
        // Arrange & Act
        let config = ClientConfig::new(vec!["127.0.0.1:22122".to_string()]);

        // Assert
        assert_eq!(config.tracker_addrs, vec!["127.0.0.1:22122".to_string()]);
        assert_eq!(config.max_conns, 10);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.network_timeout(), Duration::from_secs(30));
        assert_eq!(config.idle_timeout(), Duration::from_secs(60));
    }

    /// Test that builder methods override each setting
    #[test]
    fn test_config_builder() {
        let config = ClientConfig::new(vec!["127.0.0.1:22122".to_string()])
            .with_max_conns(50)
            .with_connect_timeout(1000)
            .with_network_timeout(2500)
            .with_idle_timeout(0);

        assert_eq!(config.max_conns, 50);
        assert_eq!(config.connect_timeout(), Duration::from_millis(1000));
        assert_eq!(config.network_timeout(), Duration::from_millis(2500));
        assert_eq!(config.idle_timeout(), Duration::ZERO);
    }
}

/// Test suite for configuration validation
///
/// Construction validates eagerly and never opens a connection, so these
/// tests need no tracker.
mod validation_tests {
    use super::*;

    /// Test that a well-formed configuration is accepted by every client
    #[test]
    fn test_valid_config() {
        let config = ClientConfig::new(vec![
            "192.168.1.100:22122".to_string(),
            "tracker.example.com:22122".to_string(),
        ]);

        assert!(config.validate().is_ok());
        assert!(TrackerClient::new(&config).is_ok(), "Blocking client should accept valid config");
        assert!(AsyncTrackerClient::new(&config).is_ok(), "Async client should accept valid config");
        assert!(StorageClient::new(&config).is_ok(), "Storage client should accept valid config");
    }

    /// Test that an empty tracker list is rejected
    #[test]
    fn test_empty_tracker_list() {
        // Arrange
        let config = ClientConfig::new(vec![]);

        // Act
        let result = TrackerClient::new(&config);

        // Assert
        assert!(
            matches!(result, Err(FastDFSError::Config(_))),
            "Client creation should fail with empty tracker addresses"
        );
    }

    /// Test that addresses without a port are rejected
    #[test]
    fn test_address_without_port() {
        for addr in ["invalid_address", ""] {
            let config = ClientConfig::new(vec![addr.to_string()]);
            assert!(
                matches!(AsyncTrackerClient::new(&config), Err(FastDFSError::Config(_))),
                "'{}' should be rejected",
                addr
            );
        }
    }

    /// Test that a pool of zero connections is rejected
    #[test]
    fn test_zero_max_conns() {
        let config = ClientConfig::new(vec!["127.0.0.1:22122".to_string()]).with_max_conns(0);

        let err = config.validate().unwrap_err();

        assert_eq!(err.to_string(), "Configuration error: max_conns must be at least 1");
    }
}
