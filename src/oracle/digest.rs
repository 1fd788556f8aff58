use sha2::{Digest, Sha256};

use super::backend::{FaceImage, FaceOracle, OracleVerdict};
use crate::error::OracleError;

/// Content-digest oracle for stub deployments and dry runs.
///
/// Two images verify only when their bytes are identical. The distance is the
/// fraction of differing bits between the SHA-256 digests: 0.0 for identical
/// content, about 0.5 for anything else. A uniform image (every byte equal)
/// stands in for "no face in view" and fails detection unless `relaxed`.
#[derive(Debug, Default)]
pub struct DigestOracle {
    comparisons: u64,
}

impl DigestOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn comparisons(&self) -> u64 {
        self.comparisons
    }
}

impl FaceOracle for DigestOracle {
    fn name(&self) -> &'static str {
        "digest"
    }

    fn verify(
        &mut self,
        probe: &FaceImage<'_>,
        reference: &FaceImage<'_>,
        relaxed: bool,
    ) -> Result<OracleVerdict, OracleError> {
        self.comparisons += 1;
        let probe_digest = digest_image(probe, relaxed)?;
        let reference_digest = digest_image(reference, relaxed)?;

        let differing: u32 = probe_digest
            .iter()
            .zip(reference_digest.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        let distance = differing as f64 / 256.0;
        Ok(OracleVerdict {
            verified: differing == 0,
            distance,
        })
    }
}

fn digest_image(image: &FaceImage<'_>, relaxed: bool) -> Result<[u8; 32], OracleError> {
    let bytes = image
        .load()
        .map_err(|e| OracleError::Failure(format!("unreadable image: {}", e)))?;
    let Some(first) = bytes.first() else {
        return Err(OracleError::Failure("empty image".to_string()));
    };
    if !relaxed && bytes.iter().all(|b| b == first) {
        return Err(OracleError::NoFaceDetected);
    }
    Ok(Sha256::digest(&bytes).into())
}
