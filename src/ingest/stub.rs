//! Synthetic camera for `stub://` devices.
//!
//! Produces deterministic RGB frames so that tests and dry runs exercise the
//! full verification loop without hardware.

use anyhow::{anyhow, Result};

use super::{CameraConfig, FrameSource};
use crate::frame::Frame;

/// Largest synthetic RGB frame, in bytes.
const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

pub struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
    open: bool,
    /// Simulated scene state; changes every 50 frames.
    scene_state: u8,
}

impl SyntheticCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            open: false,
            scene_state: 0,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// RGB buffer size for the configured dimensions.
    fn frame_bytes(&self) -> Result<usize> {
        (self.config.width as usize)
            .checked_mul(self.config.height as usize)
            .and_then(|pixels| pixels.checked_mul(3))
            .filter(|bytes| *bytes <= MAX_FRAME_BYTES)
            .ok_or_else(|| {
                anyhow!(
                    "{}: {}x{} frame exceeds {} byte limit",
                    self.config.device,
                    self.config.width,
                    self.config.height,
                    MAX_FRAME_BYTES
                )
            })
    }

    fn generate_synthetic_pixels(&mut self, pixel_count: usize) -> Vec<u8> {
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticCamera {
    fn device_id(&self) -> &str {
        &self.config.device
    }

    /// Synthetic cameras always open.
    fn open(&mut self) -> Result<()> {
        self.open = true;
        log::info!("SyntheticCamera: opened {}", self.config.device);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.open {
            return Err(anyhow!("{} is not open", self.config.device));
        }
        if let Some(limit) = self.config.frame_limit {
            if self.frame_count >= limit {
                return Ok(None);
            }
        }
        let pixel_count = self.frame_bytes()?;
        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels(pixel_count);
        Ok(Some(Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )))
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            log::info!(
                "SyntheticCamera: closed {} after {} frames",
                self.config.device,
                self.frame_count
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CameraConfig {
        CameraConfig {
            device: "stub://test".to_string(),
            target_fps: 10,
            width: 8,
            height: 4,
            frame_limit: None,
        }
    }

    #[test]
    fn synthetic_camera_produces_frames() -> Result<()> {
        let mut camera = SyntheticCamera::new(stub_config());
        camera.open()?;

        let frame = camera.next_frame()?.expect("frame");
        assert_eq!(frame.width, 8);
        assert_eq!(frame.height, 4);
        assert_eq!(frame.byte_len(), 8 * 4 * 3);
        assert_eq!(frame.sequence, 1);
        Ok(())
    }

    #[test]
    fn reading_before_open_fails() {
        let mut camera = SyntheticCamera::new(stub_config());
        assert!(camera.next_frame().is_err());
    }

    #[test]
    fn close_is_idempotent() -> Result<()> {
        let mut camera = SyntheticCamera::new(stub_config());
        camera.close();
        camera.open()?;
        camera.close();
        camera.close();
        assert!(!camera.is_open());
        Ok(())
    }

    #[test]
    fn oversized_dimensions_fail_without_panicking() -> Result<()> {
        for (width, height) in [(u32::MAX, u32::MAX), (100_000, 100_000)] {
            let mut camera = SyntheticCamera::new(CameraConfig {
                width,
                height,
                ..stub_config()
            });
            camera.open()?;
            let err = camera.next_frame().unwrap_err();
            assert!(err.to_string().contains("byte limit"));
            assert_eq!(camera.frames_captured(), 0);
        }
        Ok(())
    }

    #[test]
    fn frame_limit_ends_stream() -> Result<()> {
        let mut camera = SyntheticCamera::new(CameraConfig {
            frame_limit: Some(3),
            ..stub_config()
        });
        camera.open()?;
        let mut count = 0;
        while camera.next_frame()?.is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
        Ok(())
    }
}
