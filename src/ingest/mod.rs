//! Camera frame sources.
//!
//! This module provides the sources the verification loop pulls frames from:
//! - Synthetic camera (`stub://` devices, testing and dry runs)
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! Every source implements `FrameSource`:
//! - `open` acquires the device; failures are reported, never retried here
//! - `next_frame` yields the next capture, or `None` at end-of-stream
//! - `close` releases the device and MUST be safe to call after a failed
//!   `open`, after a mid-stream error, and more than once
//!
//! Sources MUST NOT store frames to disk or retain them after handoff.
//! Exclusive ownership of a device across sessions is enforced by
//! `session::DeviceLease`, not by the sources themselves.

use anyhow::Result;

use crate::frame::Frame;

pub mod stub;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

pub use stub::SyntheticCamera;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Camera;

/// Contract between a camera device and the verification loop.
pub trait FrameSource {
    /// Stable device identifier used for exclusive-ownership claims.
    fn device_id(&self) -> &str;

    /// Acquire the device.
    fn open(&mut self) -> Result<()>;

    /// Capture the next frame. `Ok(None)` signals end-of-stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the device. Idempotent.
    fn close(&mut self);
}

/// Configuration for a camera.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0") or `stub://<name>` for a synthetic camera.
    pub device: String,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Synthetic cameras report end-of-stream after this many frames.
    pub frame_limit: Option<u64>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 30,
            width: 640,
            height: 480,
            frame_limit: None,
        }
    }
}

/// Camera selected from a device string.
pub struct Camera {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    V4l2(V4l2Camera),
}

impl Camera {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.device.trim().is_empty() {
            anyhow::bail!("camera device must not be empty");
        }
        if config.device.starts_with("stub://") {
            Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            })
        } else {
            #[cfg(feature = "ingest-v4l2")]
            {
                Ok(Self {
                    backend: CameraBackend::V4l2(V4l2Camera::new(config)),
                })
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                anyhow::bail!(
                    "camera {} requires the ingest-v4l2 feature",
                    config.device
                )
            }
        }
    }

    /// Number of frames captured since construction.
    pub fn frames_captured(&self) -> u64 {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.frames_captured(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::V4l2(source) => source.frames_captured(),
        }
    }
}

impl FrameSource for Camera {
    fn device_id(&self) -> &str {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.device_id(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::V4l2(source) => source.device_id(),
        }
    }

    fn open(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.open(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::V4l2(source) => source.open(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::V4l2(source) => source.next_frame(),
        }
    }

    fn close(&mut self) {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.close(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::V4l2(source) => source.close(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_device_selects_synthetic_camera() -> Result<()> {
        let mut camera = Camera::new(CameraConfig {
            device: "stub://front_desk".to_string(),
            frame_limit: Some(2),
            ..CameraConfig::default()
        })?;
        assert_eq!(camera.device_id(), "stub://front_desk");

        camera.open()?;
        assert!(camera.next_frame()?.is_some());
        assert!(camera.next_frame()?.is_some());
        assert!(camera.next_frame()?.is_none());
        camera.close();

        assert_eq!(camera.frames_captured(), 2);
        Ok(())
    }

    #[test]
    fn empty_device_is_rejected() {
        let result = Camera::new(CameraConfig {
            device: "  ".to_string(),
            ..CameraConfig::default()
        });
        assert!(result.is_err());
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    #[test]
    fn hardware_device_requires_feature() {
        let result = Camera::new(CameraConfig::default());
        assert!(result.is_err());
    }
}
