//! Live 1:1 verification.
//!
//! The controller opens the camera, waits for the sensor to settle, then
//! samples every Nth frame against one enrolled reference:
//!
//! ```text
//! Initializing --open fails--> DeviceError
//!      |
//!      v
//!   Sampling --accepted--> Matched
//!      |
//!      +--end-of-stream / budget / cancel--> NoMatch
//!      +--capture error--> DeviceError
//! ```
//!
//! The camera is released from every terminal state. Frames the oracle
//! rejects, or in which it finds no face, simply keep the loop going.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{AuthError, OracleError};
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::oracle::{FaceImage, FaceOracle};
use crate::session::{DeviceLease, Session};
use crate::threshold::{MatchDecision, ThresholdPolicy};
use crate::BiometricTemplate;

pub const DEFAULT_WARMUP: Duration = Duration::from_secs(2);
pub const DEFAULT_SAMPLE_STRIDE: u64 = 10;

/// Granularity at which the warm-up pause checks for cancellation.
const WARMUP_SLICE: Duration = Duration::from_millis(50);

#[derive(Clone, Debug)]
pub struct VerificationConfig {
    /// Pause after opening the device before the first frame is read.
    pub warmup: Duration,
    /// Only every `sample_stride`-th frame (starting with the first) reaches the oracle.
    pub sample_stride: u64,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
    /// Stop after sampling for this long.
    pub max_duration: Option<Duration>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            warmup: DEFAULT_WARMUP,
            sample_stride: DEFAULT_SAMPLE_STRIDE,
            max_frames: None,
            max_duration: None,
        }
    }
}

/// External stop request for a running verification.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VerificationState {
    Initializing,
    Sampling,
    Matched,
    NoMatch,
    DeviceError,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum StopReason {
    Matched,
    EndOfStream,
    FrameBudget,
    TimeBudget,
    Cancelled,
}

/// Result of one verification run.
#[derive(Clone, Debug, Serialize)]
pub struct VerificationOutcome {
    pub state: VerificationState,
    pub stop_reason: StopReason,
    /// Decision for the last frame the oracle judged (the accepted one on a match).
    pub decision: Option<MatchDecision>,
    pub frames_seen: u64,
    pub frames_sampled: u64,
}

impl VerificationOutcome {
    pub fn verified(&self) -> bool {
        self.state == VerificationState::Matched
    }
}

/// Loop state carried from one sampling step to the next.
#[derive(Clone, Copy, Debug, Default)]
struct Progress {
    frames_seen: u64,
    frames_sampled: u64,
    last: Option<MatchDecision>,
}

impl Progress {
    fn matched(&self) -> bool {
        self.last.is_some_and(|decision| decision.verified)
    }
}

pub struct VerificationController<'o> {
    oracle: &'o mut dyn FaceOracle,
    policy: ThresholdPolicy,
    config: VerificationConfig,
}

impl<'o> VerificationController<'o> {
    pub fn new(
        oracle: &'o mut dyn FaceOracle,
        policy: ThresholdPolicy,
        config: VerificationConfig,
    ) -> Self {
        Self {
            oracle,
            policy,
            config,
        }
    }

    /// Verify the person in front of `source` against `reference`.
    ///
    /// `preview`, when given, sees every captured frame, sampled or not.
    pub fn run(
        &mut self,
        session: &Session,
        reference: &BiometricTemplate,
        source: &mut dyn FrameSource,
        cancel: &CancelToken,
        mut preview: Option<&mut dyn FnMut(&Frame)>,
    ) -> Result<VerificationOutcome, AuthError> {
        let reference_image = reference
            .image()
            .ok_or(AuthError::ReferenceMissing(reference.identity.id))?;
        let reference_file = session.materialize("reference", reference_image)?;
        let stride = self.config.sample_stride.max(1);

        let mut state = VerificationState::Initializing;
        log::debug!("verification {}: {:?}", session.id(), state);
        let mut lease = DeviceLease::acquire(source)?;

        if !self.warm_up(cancel) {
            log::info!("verification cancelled during warm-up");
            return Ok(VerificationOutcome {
                state: VerificationState::NoMatch,
                stop_reason: StopReason::Cancelled,
                decision: None,
                frames_seen: 0,
                frames_sampled: 0,
            });
        }

        state = VerificationState::Sampling;
        log::debug!("verification {}: {:?}", session.id(), state);
        let started = Instant::now();
        let mut progress = Progress::default();

        let stop_reason = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if let Some(max) = self.config.max_frames {
                if progress.frames_seen >= max {
                    break StopReason::FrameBudget;
                }
            }
            if let Some(max) = self.config.max_duration {
                if started.elapsed() >= max {
                    break StopReason::TimeBudget;
                }
            }

            let frame = match lease.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break StopReason::EndOfStream,
                Err(err) => {
                    log::warn!(
                        "verification {}: {:?} after {} frames: {:#}",
                        session.id(),
                        VerificationState::DeviceError,
                        progress.frames_seen,
                        err
                    );
                    return Err(AuthError::DeviceUnavailable(format!(
                        "{}: capture failed: {:#}",
                        lease.device(),
                        err
                    )));
                }
            };

            if let Some(observer) = preview.as_deref_mut() {
                observer(&frame);
            }

            progress = self.sample_step(progress, &frame, reference_file.path(), stride);
            if progress.matched() {
                break StopReason::Matched;
            }
        };

        state = if stop_reason == StopReason::Matched {
            VerificationState::Matched
        } else {
            VerificationState::NoMatch
        };
        log::info!(
            "verification for identity {}: {:?} ({:?}, {} frames, {} sampled)",
            reference.identity.id,
            state,
            stop_reason,
            progress.frames_seen,
            progress.frames_sampled
        );

        Ok(VerificationOutcome {
            state,
            stop_reason,
            decision: progress.last,
            frames_seen: progress.frames_seen,
            frames_sampled: progress.frames_sampled,
        })
    }

    /// Sleep for the warm-up period. Returns false if cancelled meanwhile.
    fn warm_up(&self, cancel: &CancelToken) -> bool {
        let deadline = Instant::now() + self.config.warmup;
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(WARMUP_SLICE.min(deadline - now));
        }
    }

    /// Advance the loop by one frame.
    fn sample_step(
        &mut self,
        progress: Progress,
        frame: &Frame,
        reference: &Path,
        stride: u64,
    ) -> Progress {
        let index = progress.frames_seen;
        let mut next = Progress {
            frames_seen: index + 1,
            ..progress
        };
        if index % stride != 0 {
            return next;
        }

        next.frames_sampled += 1;
        match self
            .oracle
            .verify(&FaceImage::Frame(frame), &FaceImage::File(reference), false)
        {
            Ok(verdict) => {
                let decision = self.policy.decide(verdict);
                log::debug!(
                    "frame {}: verified={} distance={:.4} threshold={:.4}",
                    frame.sequence,
                    decision.verified,
                    decision.distance,
                    decision.threshold
                );
                next.last = Some(decision);
            }
            Err(OracleError::NoFaceDetected) => {
                log::debug!("frame {}: no face detected", frame.sequence);
            }
            Err(err) => {
                log::warn!("frame {}: {}", frame.sequence, err);
            }
        }
        next
    }
}
