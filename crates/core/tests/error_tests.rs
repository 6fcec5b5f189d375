//! Tests for error types

use resviz_core::{Error, ProviderError};
use std::path::Path;

#[test]
fn test_configuration_error() {
    let error = Error::configuration("settings are invalid");
    assert_eq!(error.to_string(), "Configuration error: settings are invalid");

    let error = Error::configuration_with_help("bad ttl", "use seconds");
    assert_eq!(error.to_string(), "Configuration error: bad ttl");
    assert!(matches!(error, Error::Configuration { help: Some(_), .. }));
}

#[test]
fn test_validation_error() {
    let error = Error::validation("unknown service");
    assert_eq!(error.to_string(), "Validation failed: unknown service");
}

#[test]
fn test_io_error_with_path() {
    use std::io;

    let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
    let error = Error::io(io_error, Path::new("/tmp/settings.toml"), "read");
    assert_eq!(error.to_string(), "I/O read failed: /tmp/settings.toml");
}

#[test]
fn test_io_error_conversion() {
    use std::io;

    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    let error = Error::from(io_error);
    assert!(error.to_string().contains("I/O") && error.to_string().contains("failed"));
}

#[test]
fn test_error_source_chain() {
    use std::error::Error as StdError;
    use std::io;

    let io_error = io::Error::other("disk gone");
    let error = Error::io(io_error, Path::new("/var/cache/resviz"), "write");
    let source = error.source().expect("io error should expose its source");
    assert_eq!(source.to_string(), "disk gone");
}

#[test]
fn test_provider_error_messages() {
    let error = ProviderError::unexpected("Lambda", "connection reset");
    assert_eq!(
        error.to_string(),
        "Lambda data fetch error: connection reset"
    );

    let error = ProviderError::unsupported("DynamoDB");
    assert_eq!(error.to_string(), "Unsupported service: DynamoDB");
    assert_eq!(error.service(), "DynamoDB");
}
