//! V4L2 camera.
//!
//! Captures RGB frames from a local device node (e.g., /dev/video0) using
//! memory-mapped buffers. Frames stay in memory and are handed to the
//! verification loop one at a time.

use anyhow::{Context, Result};
use ouroboros::self_referencing;

use super::{CameraConfig, FrameSource};
use crate::frame::Frame;

pub struct V4l2Camera {
    config: CameraConfig,
    state: Option<V4l2State>,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Camera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            frame_count: 0,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}

impl FrameSource for V4l2Camera {
    fn device_id(&self) -> &str {
        &self.config.device
    }

    fn open(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Camera: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Camera: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;

        let state = V4l2StateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "V4l2Camera: opened {} ({}x{})",
            self.config.device,
            self.active_width,
            self.active_height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        if let Some(limit) = self.config.frame_limit {
            if self.frame_count >= limit {
                return Ok(None);
            }
        }

        let state = self.state.as_mut().context("v4l2 device not open")?;
        let pixels = state.with_stream_mut(|stream| {
            stream
                .next()
                .map(|(buf, _meta)| buf.to_vec())
                .context("capture v4l2 frame")
        })?;

        self.frame_count += 1;
        Ok(Some(Frame::new(
            pixels,
            self.active_width,
            self.active_height,
            self.frame_count,
        )))
    }

    fn close(&mut self) {
        // Dropping the state unmaps the buffers and closes the device node.
        if self.state.take().is_some() {
            log::info!(
                "V4l2Camera: closed {} after {} frames",
                self.config.device,
                self.frame_count
            );
        }
    }
}
