/// Shared Test Helpers for Cross-Crate Use
///
/// This module provides centralized test utilities that can be used across
/// the workspace crates to avoid code duplication.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

// Global counter for truly unique test identifiers across parallel tests
static GLOBAL_TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate globally unique test identifiers that won't conflict across parallel tests
///
/// This creates IDs using timestamp + atomic counter to ensure uniqueness even when
/// running tests in parallel across multiple threads and crates.
///
/// # Arguments
/// * `prefix` - A string prefix to identify the test type (e.g., "SIGNUP", "ORDER")
///
/// # Returns
/// A unique string in the format: "{prefix}-{timestamp}-{counter}"
pub fn generate_unique_id(prefix: &str) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis();
    let counter = GLOBAL_TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}-{}", prefix, timestamp, counter)
}

/// Get the test database URL from environment or default
///
/// This centralizes database URL configuration for integration tests that
/// talk to a real MongoDB instance.
pub fn get_test_database_url() -> String {
    std::env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
}

/// Get the test database name, namespaced away from any dev data.
pub fn get_test_database_name() -> String {
    std::env::var("MONGODB_TEST_DB").unwrap_or_else(|_| "bookstore_test".to_string())
}

// =============================================================================
// UNIFIED TEST ERROR HANDLING
// =============================================================================

/// Unified error type for all test failures
///
/// This provides a consistent error interface across all test suites,
/// making debugging easier and error handling more predictable.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    #[error("Mock failure: {message}")]
    MockFailure { message: String },

    #[error("Assertion failed: {message}")]
    AssertionFailure { message: String },

    #[error("Serialization error: {source}")]
    SerializationError { #[from] source: serde_json::Error },

    #[error("HTTP error: {source}")]
    HttpError { #[from] source: http::Error },

    #[error("Generic test error: {message}")]
    Generic { message: String },
}

impl TestError {
    /// Create a mock failure error
    pub fn mock_failure(message: impl Into<String>) -> Self {
        Self::MockFailure { message: message.into() }
    }

    /// Create an assertion failure error
    pub fn assertion_failure(message: impl Into<String>) -> Self {
        Self::AssertionFailure { message: message.into() }
    }

    /// Create a generic error
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic { message: message.into() }
    }
}

/// Alias for the standard test result type
pub type TestResult<T = ()> = Result<T, TestError>;

/// Helper macro for test assertions that return TestError instead of panicking
#[macro_export]
macro_rules! test_assert {
    ($condition:expr) => {
        if !($condition) {
            return Err($crate::test_helpers::TestError::assertion_failure(
                format!("assertion failed: {}", stringify!($condition))
            ));
        }
    };
    ($condition:expr, $message:expr $(, $arg:expr)*) => {
        if !($condition) {
            return Err($crate::test_helpers::TestError::assertion_failure(
                format!($message $(, $arg)*)
            ));
        }
    };
}

/// Helper macro for test assertions with equality
#[macro_export]
macro_rules! test_assert_eq {
    ($left:expr, $right:expr) => {
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    return Err($crate::test_helpers::TestError::assertion_failure(
                        format!("assertion failed: `(left == right)`\n  left: `{:?}`,\n right: `{:?}`",
                                left_val, right_val)
                    ));
                }
            }
        }
    };
    ($left:expr, $right:expr, $message:expr $(, $arg:expr)*) => {
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    return Err($crate::test_helpers::TestError::assertion_failure(
                        format!($message $(, $arg)*)
                    ));
                }
            }
        }
    };
}

/// Utility functions for common test operations
pub mod test_utils {
    use super::*;

    /// Safe HTTP request builder that returns TestError
    pub fn build_request(method: &str, uri: &str, body: Option<String>) -> TestResult<http::Request<String>> {
        let mut builder = http::Request::builder()
            .uri(uri)
            .method(method);

        if body.is_some() {
            builder = builder.header("Content-Type", "application/json");
        }

        let request = builder
            .body(body.unwrap_or_default())
            .map_err(TestError::from)?;

        Ok(request)
    }

    /// Same as [`build_request`] but with a bearer token attached.
    pub fn build_authed_request(
        method: &str,
        uri: &str,
        token: &str,
        body: Option<String>,
    ) -> TestResult<http::Request<String>> {
        let mut builder = http::Request::builder()
            .uri(uri)
            .method(method)
            .header("Authorization", format!("Bearer {}", token));

        if body.is_some() {
            builder = builder.header("Content-Type", "application/json");
        }

        let request = builder
            .body(body.unwrap_or_default())
            .map_err(TestError::from)?;

        Ok(request)
    }

    /// Safe JSON serialization that returns TestError
    pub fn serialize_json<T: serde::Serialize>(value: &T) -> TestResult<String> {
        serde_json::to_string(value).map_err(TestError::from)
    }

    /// Safe response status check
    pub fn check_status_code(actual: http::StatusCode, expected: http::StatusCode) -> TestResult<()> {
        if actual != expected {
            return Err(TestError::assertion_failure(
                format!("Status code mismatch: expected {}, got {}", expected, actual)
            ));
        }
        Ok(())
    }
}
