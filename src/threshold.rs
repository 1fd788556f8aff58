//! Adaptive acceptance threshold.
//!
//! The accept boundary scales with the observed distance and is clamped to a
//! fixed band: `threshold(d) = clamp(d * scale, lower, upper)`. A comparison is
//! accepted only when the oracle itself says "verified" AND `d < threshold(d)`.

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::oracle::OracleVerdict;

pub const DEFAULT_SCALE: f64 = 1.2;
pub const DEFAULT_LOWER: f64 = 0.25;
pub const DEFAULT_UPPER: f64 = 0.6;

/// Outcome of one thresholded comparison. Immutable once produced.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MatchDecision {
    pub verified: bool,
    pub distance: f64,
    pub threshold: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThresholdPolicy {
    scale: f64,
    lower: f64,
    upper: f64,
}

impl ThresholdPolicy {
    pub fn new(scale: f64, lower: f64, upper: f64) -> Result<Self> {
        if !(scale.is_finite() && lower.is_finite() && upper.is_finite()) {
            return Err(anyhow!("threshold parameters must be finite"));
        }
        if scale <= 0.0 {
            return Err(anyhow!("threshold scale must be greater than zero"));
        }
        if lower < 0.0 || lower > upper {
            return Err(anyhow!(
                "threshold bounds must satisfy 0 <= lower <= upper (lower={}, upper={})",
                lower,
                upper
            ));
        }
        Ok(Self {
            scale,
            lower,
            upper,
        })
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Acceptance threshold for an observed distance.
    pub fn threshold(&self, distance: f64) -> f64 {
        (distance * self.scale).clamp(self.lower, self.upper)
    }

    /// Apply the policy to an oracle verdict.
    ///
    /// NaN distances fail the strict comparison and are never accepted.
    pub fn decide(&self, verdict: OracleVerdict) -> MatchDecision {
        let threshold = self.threshold(verdict.distance);
        MatchDecision {
            verified: verdict.verified && verdict.distance < threshold,
            distance: verdict.distance,
            threshold,
        }
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            lower: DEFAULT_LOWER,
            upper: DEFAULT_UPPER,
        }
    }
}
