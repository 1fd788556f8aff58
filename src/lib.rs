//! Face Gate
//!
//! Biometric face authentication for gating access to the ballot workflow.
//!
//! # Protocols
//!
//! 1. **Live verification (1:1)**: sample a camera stream and confirm the person
//!    in view matches one enrolled identity (`verification`).
//! 2. **Identification (1:N)**: find which enrolled identity, if any, a captured
//!    still image belongs to (`gallery`).
//!
//! The recognition model is external and reached only through the
//! `oracle::FaceOracle` contract. Acceptance uses an adaptive threshold
//! (`threshold`). Every request runs inside a `session::Session`, which releases
//! scratch images and the camera on all exit paths.
//!
//! # Module Structure
//!
//! - `frame`: camera frame container
//! - `ingest`: frame sources (synthetic, V4L2)
//! - `oracle`: oracle contract, registry, digest oracle
//! - `threshold`: threshold policy and match decisions
//! - `session`: scratch files and exclusive device leases
//! - `verification`, `gallery`: the two controllers
//! - `enroll`: enrollment stores and photo intake
//! - `auth`: request facade and result surface
//! - `config`: configuration loading

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

pub mod auth;
pub mod config;
pub mod enroll;
pub mod error;
pub mod frame;
pub mod gallery;
pub mod ingest;
pub mod oracle;
pub mod session;
pub mod threshold;
pub mod verification;

pub use auth::{Authenticator, IdentifyResponse, VerifyResponse};
pub use enroll::{EnrollmentStore, InMemoryEnrollmentStore, NewEnrollment, SqliteEnrollmentStore};
pub use error::{AuthError, OracleError};
pub use frame::Frame;
pub use gallery::{GallerySearch, SearchConfig, SearchOutcome};
pub use ingest::{Camera, CameraConfig, FrameSource, SyntheticCamera};
pub use oracle::{DigestOracle, FaceImage, FaceOracle, OracleRegistry, OracleVerdict, SharedOracle};
pub use session::{DeviceLease, ScratchFile, Session};
pub use threshold::{MatchDecision, ThresholdPolicy};
pub use verification::{
    CancelToken, StopReason, VerificationConfig, VerificationController, VerificationOutcome,
    VerificationState,
};

// -------------------- Identities --------------------

/// Enrolled voter as shown to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub citizenship_number: String,
    pub admin: bool,
    pub is_blind: bool,
    pub is_disabled: bool,
}

impl Identity {
    /// Identity with only an id and a name set.
    pub fn named(id: u64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            email: String::new(),
            citizenship_number: String::new(),
            admin: false,
            is_blind: false,
            is_disabled: false,
        }
    }
}

// -------------------- Templates --------------------

/// Enrolled reference photo tied to one identity.
///
/// The image is opaque encoded bytes; the core only hands it to the oracle.
/// Bytes are zeroized on drop and never printed.
#[derive(Clone)]
pub struct BiometricTemplate {
    pub identity: Identity,
    image: Option<Vec<u8>>,
}

impl BiometricTemplate {
    pub fn new(identity: Identity, image: Vec<u8>) -> Self {
        Self {
            identity,
            image: Some(image).filter(|bytes| !bytes.is_empty()),
        }
    }

    /// Gallery entry for an identity that never enrolled a photo.
    pub fn without_image(identity: Identity) -> Self {
        Self {
            identity,
            image: None,
        }
    }

    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

impl std::fmt::Debug for BiometricTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiometricTemplate")
            .field("identity", &self.identity)
            .field("image_bytes", &self.image.as_ref().map(|bytes| bytes.len()))
            .finish()
    }
}

impl Drop for BiometricTemplate {
    fn drop(&mut self) {
        if let Some(image) = self.image.as_mut() {
            image.zeroize();
        }
    }
}
