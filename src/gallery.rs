//! 1:N identification against an ordered gallery.
//!
//! The probe image is compared with each enrolled template in gallery order
//! and the scan stops at the first accepted candidate. Earlier entries win
//! ties; there is no ranking by distance.
//!
//! Failure isolation is per candidate: a candidate without an image is skipped,
//! and a candidate whose comparison fails is logged and counted as "no match".
//! Each candidate's scratch image is removed right after its comparison, and
//! the probe's scratch image once the search returns.

use serde::Serialize;

use crate::error::{AuthError, OracleError};
use crate::oracle::{FaceImage, FaceOracle, OracleVerdict};
use crate::session::Session;
use crate::threshold::{MatchDecision, ThresholdPolicy};
use crate::{BiometricTemplate, Identity};

#[derive(Clone, Copy, Debug)]
pub struct SearchConfig {
    /// Compare candidates even when the oracle cannot confidently detect a face.
    pub relaxed_detection: bool,
    /// Also require `distance < threshold(distance)`, not just the oracle's flag.
    pub apply_threshold: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            relaxed_detection: true,
            apply_threshold: false,
        }
    }
}

/// Result of one identification search.
#[derive(Clone, Debug, Serialize)]
pub struct SearchOutcome {
    pub matched: Option<Identity>,
    /// Raw oracle answer for the accepted candidate.
    pub verdict: Option<OracleVerdict>,
    /// Threshold policy applied to `verdict`. Unless `apply_threshold` is set,
    /// `decision.verified` may be false for an accepted candidate.
    pub decision: Option<MatchDecision>,
    /// Candidates handed to the oracle.
    pub candidates_compared: usize,
    /// Candidates skipped for lack of a template image.
    pub candidates_skipped: usize,
}

pub struct GallerySearch<'o> {
    oracle: &'o mut dyn FaceOracle,
    policy: ThresholdPolicy,
    config: SearchConfig,
}

impl<'o> GallerySearch<'o> {
    pub fn new(oracle: &'o mut dyn FaceOracle, policy: ThresholdPolicy, config: SearchConfig) -> Self {
        Self {
            oracle,
            policy,
            config,
        }
    }

    /// Find the first gallery entry the probe image is accepted against.
    pub fn search(
        &mut self,
        session: &Session,
        probe: &[u8],
        gallery: &[BiometricTemplate],
    ) -> Result<SearchOutcome, AuthError> {
        if probe.is_empty() {
            return Err(AuthError::OracleFailure("probe image is empty".to_string()));
        }
        let probe_file = session.materialize("probe", probe)?;

        let mut outcome = SearchOutcome {
            matched: None,
            verdict: None,
            decision: None,
            candidates_compared: 0,
            candidates_skipped: 0,
        };

        for template in gallery {
            let identity = &template.identity;
            let Some(image) = template.image() else {
                log::debug!("identity {}: no enrolled image, skipped", identity.id);
                outcome.candidates_skipped += 1;
                continue;
            };

            outcome.candidates_compared += 1;
            let Some(verdict) = self.compare(session, probe_file.path(), identity, image) else {
                continue;
            };
            let decision = self.policy.decide(verdict);
            let accepted = if self.config.apply_threshold {
                decision.verified
            } else {
                verdict.verified
            };
            if accepted {
                log::info!(
                    "identification matched identity {} (distance={:.4}) after {} comparisons",
                    identity.id,
                    verdict.distance,
                    outcome.candidates_compared
                );
                outcome.matched = Some(identity.clone());
                outcome.verdict = Some(verdict);
                outcome.decision = Some(decision);
                return Ok(outcome);
            }
        }

        log::info!(
            "identification found no match ({} compared, {} skipped)",
            outcome.candidates_compared,
            outcome.candidates_skipped
        );
        Ok(outcome)
    }

    /// Compare the probe with one candidate. `None` when the comparison failed.
    fn compare(
        &mut self,
        session: &Session,
        probe: &std::path::Path,
        identity: &Identity,
        image: &[u8],
    ) -> Option<OracleVerdict> {
        let candidate = match session.materialize("candidate", image) {
            Ok(file) => file,
            Err(err) => {
                log::warn!("identity {}: could not stage template: {}", identity.id, err);
                return None;
            }
        };

        let result = self.oracle.verify(
            &FaceImage::File(probe),
            &FaceImage::File(candidate.path()),
            self.config.relaxed_detection,
        );
        drop(candidate);

        match result {
            Ok(verdict) => Some(verdict),
            Err(OracleError::NoFaceDetected) => {
                log::debug!("identity {}: no face detected", identity.id);
                None
            }
            Err(err) => {
                log::warn!("identity {}: comparison failed: {}", identity.id, err);
                None
            }
        }
    }
}
