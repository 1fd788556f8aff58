//! Error taxonomy for the authentication protocols.
//!
//! `OracleError` is recovered inside the per-frame and per-candidate
//! boundaries. `AuthError` is what a request surfaces to its caller.

use thiserror::Error;

/// Failure reported by a face oracle for one comparison.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The oracle could not locate a face in one of the images.
    #[error("no face detected")]
    NoFaceDetected,
    /// Any other oracle failure (unreadable image, backend fault, ...).
    #[error("oracle failure: {0}")]
    Failure(String),
}

/// Request-level failure of a verification or identification call.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The camera could not be opened, is held by another session, or failed mid-stream.
    #[error("camera device unavailable: {0}")]
    DeviceUnavailable(String),
    /// No enrolled template exists for the requested identity.
    #[error("no enrolled template for identity {0}")]
    ReferenceMissing(u64),
    /// Oracle failure outside a per-frame or per-candidate boundary.
    #[error("oracle failure: {0}")]
    OracleFailure(String),
    /// Request-scoped scratch artifacts could not be created.
    #[error("scratch artifact error: {0}")]
    Scratch(#[from] std::io::Error),
    /// Enrollment store lookup failed.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl AuthError {
    /// True for failures caused by the camera rather than the request contents.
    pub fn is_device_error(&self) -> bool {
        matches!(self, AuthError::DeviceUnavailable(_))
    }
}
