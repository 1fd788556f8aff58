//! Request facade for the route layer.
//!
//! `Authenticator` resolves templates from the enrollment store, opens a
//! session per request, runs the matching controller, and reduces the outcome
//! to the result surface: `{ verified }` for verification and
//! `{ matched, identity }` for identification. Mapping these to HTTP statuses
//! is left to the caller.

use std::path::PathBuf;

use serde::Serialize;

use crate::config::FaceGateConfig;
use crate::enroll::EnrollmentStore;
use crate::error::{AuthError, OracleError};
use crate::frame::Frame;
use crate::gallery::{GallerySearch, SearchConfig};
use crate::ingest::FrameSource;
use crate::oracle::{FaceImage, FaceOracle, OracleVerdict, SharedOracle};
use crate::session::Session;
use crate::threshold::ThresholdPolicy;
use crate::verification::{CancelToken, VerificationConfig, VerificationController};
use crate::Identity;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerifyResponse {
    pub verified: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IdentifyResponse {
    pub matched: bool,
    pub identity: Option<Identity>,
}

pub struct Authenticator<S: EnrollmentStore> {
    store: S,
    oracle: SharedOracle,
    policy: ThresholdPolicy,
    verification: VerificationConfig,
    search: SearchConfig,
    scratch_root: PathBuf,
}

impl<S: EnrollmentStore> Authenticator<S> {
    pub fn new(store: S, oracle: SharedOracle, scratch_root: PathBuf) -> Self {
        Self {
            store,
            oracle,
            policy: ThresholdPolicy::default(),
            verification: VerificationConfig::default(),
            search: SearchConfig::default(),
            scratch_root,
        }
    }

    /// Build from loaded configuration.
    pub fn from_config(store: S, oracle: SharedOracle, config: &FaceGateConfig) -> Self {
        Self {
            store,
            oracle,
            policy: config.threshold,
            verification: config.verification.clone(),
            search: config.search,
            scratch_root: config.scratch_dir.clone(),
        }
    }

    pub fn with_policy(mut self, policy: ThresholdPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_verification(mut self, config: VerificationConfig) -> Self {
        self.verification = config;
        self
    }

    pub fn with_search(mut self, config: SearchConfig) -> Self {
        self.search = config;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Live 1:1 verification of `user_id` against the person in front of `camera`.
    ///
    /// Fails with `ReferenceMissing` before the camera is touched when the
    /// identity has no enrolled photo.
    pub fn verify_user(
        &self,
        user_id: u64,
        camera: &mut dyn FrameSource,
        cancel: &CancelToken,
        preview: Option<&mut dyn FnMut(&Frame)>,
    ) -> Result<VerifyResponse, AuthError> {
        let reference = self
            .store
            .get_template(user_id)?
            .filter(|template| template.has_image())
            .ok_or(AuthError::ReferenceMissing(user_id))?;

        let session = Session::open(&self.scratch_root)?;
        let mut oracle = PerCallOracle(&self.oracle);
        let outcome =
            VerificationController::new(&mut oracle, self.policy, self.verification.clone())
                .run(&session, &reference, camera, cancel, preview)?;
        Ok(VerifyResponse {
            verified: outcome.verified(),
        })
    }

    /// 1:N identification of a captured still image.
    pub fn identify(&self, image: &[u8]) -> Result<IdentifyResponse, AuthError> {
        let gallery = self.store.list_gallery()?;
        let session = Session::open(&self.scratch_root)?;
        let mut oracle = PerCallOracle(&self.oracle);
        let outcome = GallerySearch::new(&mut oracle, self.policy, self.search)
            .search(&session, image, &gallery)?;
        Ok(IdentifyResponse {
            matched: outcome.matched.is_some(),
            identity: outcome.matched,
        })
    }
}

/// Oracle view that holds the shared lock for one comparison at a time.
///
/// Device claims, warm-up and frame capture happen outside the lock, so a
/// concurrent request on the same device is refused instead of queued.
struct PerCallOracle<'a>(&'a SharedOracle);

impl FaceOracle for PerCallOracle<'_> {
    fn name(&self) -> &'static str {
        match self.0.lock() {
            Ok(oracle) => oracle.name(),
            Err(poisoned) => poisoned.into_inner().name(),
        }
    }

    fn verify(
        &mut self,
        probe: &FaceImage<'_>,
        reference: &FaceImage<'_>,
        relaxed: bool,
    ) -> Result<OracleVerdict, OracleError> {
        let mut oracle = self
            .0
            .lock()
            .map_err(|_| OracleError::Failure("oracle lock poisoned".to_string()))?;
        oracle.verify(probe, reference, relaxed)
    }
}
