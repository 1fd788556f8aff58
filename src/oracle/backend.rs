use std::borrow::Cow;
use std::path::Path;

use serde::Serialize;

use crate::error::OracleError;
use crate::frame::Frame;

/// Raw oracle answer for one comparison.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OracleVerdict {
    /// The oracle's own "same identity" judgment.
    pub verified: bool,
    /// Dissimilarity score; lower means more alike.
    pub distance: f64,
}

/// One side of a comparison.
#[derive(Clone, Copy, Debug)]
pub enum FaceImage<'a> {
    /// A live camera frame (raw pixels, in memory).
    Frame(&'a Frame),
    /// An image materialized into a session scratch file.
    File(&'a Path),
    /// Encoded image bytes held in memory.
    Encoded(&'a [u8]),
}

impl<'a> FaceImage<'a> {
    /// Load the image bytes. Files are read; in-memory images are borrowed.
    pub fn load(&self) -> std::io::Result<Cow<'a, [u8]>> {
        match *self {
            FaceImage::Frame(frame) => Ok(Cow::Borrowed(frame.pixels())),
            FaceImage::File(path) => std::fs::read(path).map(Cow::Owned),
            FaceImage::Encoded(bytes) => Ok(Cow::Borrowed(bytes)),
        }
    }
}

/// Face verification oracle.
///
/// # Audit Boundary
///
/// Implementations receive biometric images and MUST NOT:
/// - Retain image bytes beyond the `verify` call
/// - Write images to disk
/// - Log image content
///
/// `verify` is a blocking call and is not preemptible; callers only cancel
/// between calls.
pub trait FaceOracle: Send {
    /// Oracle identifier.
    fn name(&self) -> &'static str;

    /// Compare two images.
    ///
    /// With `relaxed` set, images without a confidently detected face are
    /// compared anyway instead of failing with `NoFaceDetected`.
    fn verify(
        &mut self,
        probe: &FaceImage<'_>,
        reference: &FaceImage<'_>,
        relaxed: bool,
    ) -> Result<OracleVerdict, OracleError>;

    /// Optional warm-up hook (model load, first inference).
    fn warm_up(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
