//! Error types for the SNI client

use thiserror::Error;
pub use tonic::Status;

/// Result type alias for SNI client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by [`crate::SniClient`]
#[derive(Debug, Error)]
pub enum Error {
    /// Device discovery failed; the server could not be reached
    #[error("no connection to SNI: {0}")]
    NoConnection(Status),

    /// An operation needing an active session ran without one
    #[error("no connected device")]
    NoConnectedDevice,

    /// Empty path handed to a filesystem operation
    #[error("no path provided")]
    InvalidPath,

    /// Every requested field name was unknown
    #[error("no valid fields provided")]
    NoValidFields,

    /// A remote call other than discovery failed
    #[error("{op} failed: {status}")]
    Rpc { op: &'static str, status: Status },

    /// The configured base URL is not a valid endpoint
    #[error("invalid SNI endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// Health probe did not answer in time. Only produced inside the health loop.
    #[error("health check timed out")]
    HealthCheckTimeout,
}

impl Error {
    pub(crate) fn rpc(op: &'static str) -> impl FnOnce(Status) -> Error {
        move |status| Error::Rpc { op, status }
    }

    /// True when the server could not be reached at all, as opposed to a
    /// request the device rejected.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Error::NoConnection(_) => true,
            Error::Rpc { status, .. } => status.code() == tonic::Code::Unavailable,
            _ => false,
        }
    }
}
