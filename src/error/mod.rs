// Error types for the bring-up harness
//
// This module defines the harness error type, providing structured error
// handling with numeric codes suitable for console and log scraping.

mod harness;

pub use harness::{log_harness_error, HarnessError};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent reporting on the console.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
