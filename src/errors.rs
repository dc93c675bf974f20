//! FastDFS Error Definitions
//!
//! This module defines all error types and error handling utilities for the FastDFS client.
//! Errors are split into transport errors (the exchange never completed), remote errors
//! (the server answered with a non-zero status), and protocol errors (the server answered,
//! but the body does not match the layout this client expects).

use thiserror::Error;

use crate::types::ResponseShape;

/// Result type alias for FastDFS operations
pub type Result<T> = std::result::Result<T, FastDFSError>;

/// Base error type for all FastDFS errors
#[derive(Error, Debug)]
pub enum FastDFSError {
    /// Client or pool has been closed
    #[error("Client is closed")]
    ClientClosed,

    /// Connection timeout
    #[error("Connection timeout to {0}")]
    ConnectionTimeout(String),

    /// Network I/O timeout
    #[error("Network timeout during {0}")]
    NetworkTimeout(String),

    /// Network-related error
    #[error("Network error during {operation} to {addr}: {source}")]
    Network {
        /// What was being attempted, e.g. "connect"
        operation: String,
        /// Server address
        addr: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame header could not be decoded
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Server answered with a non-zero status
    #[error("Remote error (code {code}): {message}")]
    Remote {
        /// Status byte from the response header
        code: u8,
        /// Description of the status code
        message: String,
    },

    /// Response body length does not fit the operation
    #[error("Response size mismatch: expected {expected}, actual {actual} bytes")]
    ResponseSize {
        /// Lengths the operation accepts
        expected: ResponseShape,
        /// Length the server announced
        actual: usize,
    },

    /// Fixed-size record decoded from a buffer of the wrong length
    #[error("{record} size mismatch: expected {expected} bytes, actual {actual} bytes")]
    SizeMismatch {
        /// Record type name
        record: &'static str,
        /// Record size in bytes
        expected: usize,
        /// Buffer length in bytes
        actual: usize,
    },

    /// Invalid metadata format
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Value cannot be represented
    #[error("Value out of range: {0}")]
    DataRange(String),

    /// File ID format is invalid
    #[error("Invalid file ID: {0}")]
    InvalidFileId(String),

    /// Invalid argument was provided
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Client configuration is invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FastDFSError {
    /// Whether the exchange failed in transport.
    ///
    /// Transient errors may succeed on a fresh connection; everything else is a
    /// well-formed answer that will not change on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FastDFSError::ConnectionTimeout(_)
                | FastDFSError::NetworkTimeout(_)
                | FastDFSError::Network { .. }
                | FastDFSError::Io(_)
                | FastDFSError::InvalidHeader(_)
        )
    }

    /// Remote status code carried by this error, if any
    pub fn status_code(&self) -> Option<u8> {
        match self {
            FastDFSError::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True for a remote ENOENT
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(2)
    }
}

/// Maps FastDFS protocol status codes to Rust errors
///
/// Status code 0 indicates success (no error). Any other code is an errno value
/// set by the server and is translated through the platform error table.
///
/// Common status codes:
///   - 2: File not found (ENOENT)
///   - 6: No such device or address (ENXIO)
///   - 17: File already exists (EEXIST)
///   - 22: Invalid argument (EINVAL)
///   - 28: Insufficient space (ENOSPC)
pub fn map_status_to_error(status: u8) -> Option<FastDFSError> {
    if status == 0 {
        return None;
    }

    Some(FastDFSError::Remote {
        code: status,
        message: status_message(status),
    })
}

/// Platform error string for a status code, without the "(os error N)" suffix
fn status_message(status: u8) -> String {
    let text = std::io::Error::from_raw_os_error(i32::from(status)).to_string();
    match text.rfind(" (os error") {
        Some(pos) => text[..pos].to_string(),
        None => text,
    }
}
