//! Shared fixtures: a scripted oracle that records its calls and a scripted
//! camera with injectable failures.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use face_gate::{
    BiometricTemplate, FaceImage, FaceOracle, Frame, FrameSource, Identity, OracleError,
    OracleVerdict,
};

/// One recorded oracle invocation.
#[derive(Clone, Debug)]
pub struct Call {
    pub probe: Vec<u8>,
    pub reference: Vec<u8>,
    pub reference_path: Option<PathBuf>,
    pub reference_existed: bool,
    pub relaxed: bool,
}

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    /// References (candidate images) the oracle saw, in call order.
    pub fn references(&self) -> Vec<Vec<u8>> {
        self.calls().into_iter().map(|call| call.reference).collect()
    }
}

type Script = Box<dyn FnMut(&[u8], &[u8]) -> Result<OracleVerdict, OracleError> + Send>;

/// Oracle whose answers come from a closure over (probe bytes, reference bytes).
pub struct ScriptedOracle {
    script: Script,
    log: CallLog,
}

impl ScriptedOracle {
    pub fn new<F>(script: F) -> (Self, CallLog)
    where
        F: FnMut(&[u8], &[u8]) -> Result<OracleVerdict, OracleError> + Send + 'static,
    {
        let log = CallLog::default();
        (
            Self {
                script: Box::new(script),
                log: log.clone(),
            },
            log,
        )
    }

    /// Oracle that always answers with the same verdict.
    pub fn constant(verified: bool, distance: f64) -> (Self, CallLog) {
        Self::new(move |_, _| Ok(OracleVerdict { verified, distance }))
    }
}

impl FaceOracle for ScriptedOracle {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn verify(
        &mut self,
        probe: &FaceImage<'_>,
        reference: &FaceImage<'_>,
        relaxed: bool,
    ) -> Result<OracleVerdict, OracleError> {
        let probe_bytes = probe
            .load()
            .map_err(|e| OracleError::Failure(e.to_string()))?
            .into_owned();
        let reference_bytes = reference
            .load()
            .map_err(|e| OracleError::Failure(e.to_string()))?
            .into_owned();
        let reference_path = match reference {
            FaceImage::File(path) => Some(path.to_path_buf()),
            _ => None,
        };
        self.log.0.lock().unwrap().push(Call {
            probe: probe_bytes.clone(),
            reference: reference_bytes.clone(),
            reference_existed: reference_path.as_deref().is_some_and(Path::exists),
            reference_path,
            relaxed,
        });
        (self.script)(&probe_bytes, &reference_bytes)
    }
}

pub fn accept(distance: f64) -> Result<OracleVerdict, OracleError> {
    Ok(OracleVerdict {
        verified: true,
        distance,
    })
}

pub fn reject() -> Result<OracleVerdict, OracleError> {
    Ok(OracleVerdict {
        verified: false,
        distance: 0.9,
    })
}

/// Pixel payload of the frame with the given sequence number.
pub fn frame_pixels(sequence: u64) -> Vec<u8> {
    let mut pixels = b"frame-".to_vec();
    pixels.extend_from_slice(&sequence.to_le_bytes());
    pixels
}

/// Sequence number encoded by `frame_pixels`.
pub fn frame_sequence(pixels: &[u8]) -> Option<u64> {
    let tail = pixels.strip_prefix(b"frame-")?;
    let bytes: [u8; 8] = tail.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}

/// Camera producing `frames` frames (or endless with `None`) with injectable faults.
pub struct ScriptedCamera {
    pub device: String,
    pub frames: Option<u64>,
    pub fail_open: bool,
    pub fail_at: Option<u64>,
    pub produced: u64,
    pub opens: u32,
    pub closes: u32,
    open: bool,
}

impl ScriptedCamera {
    pub fn new(device: &str, frames: Option<u64>) -> Self {
        Self {
            device: device.to_string(),
            frames,
            fail_open: false,
            fail_at: None,
            produced: 0,
            opens: 0,
            closes: 0,
            open: false,
        }
    }

    pub fn failing_open(device: &str) -> Self {
        Self {
            fail_open: true,
            ..Self::new(device, Some(0))
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl FrameSource for ScriptedCamera {
    fn device_id(&self) -> &str {
        &self.device
    }

    fn open(&mut self) -> Result<()> {
        self.opens += 1;
        if self.fail_open {
            return Err(anyhow!("device {} not found", self.device));
        }
        self.open = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.open {
            return Err(anyhow!("device not open"));
        }
        if self.fail_at == Some(self.produced) {
            return Err(anyhow!("usb disconnect"));
        }
        if let Some(limit) = self.frames {
            if self.produced >= limit {
                return Ok(None);
            }
        }
        self.produced += 1;
        Ok(Some(Frame::new(frame_pixels(self.produced), 4, 4, self.produced)))
    }

    fn close(&mut self) {
        self.closes += 1;
        self.open = false;
    }
}

pub fn template(id: u64, name: &str, image: &[u8]) -> BiometricTemplate {
    BiometricTemplate::new(Identity::named(id, name), image.to_vec())
}

/// Entries (files or directories) left under a scratch root.
pub fn leftovers(root: &Path) -> usize {
    std::fs::read_dir(root).map(|dir| dir.count()).unwrap_or(0)
}
