//! Request-scoped resource management.
//!
//! Every verification or identification request runs inside a `Session`.
//! Resources acquired under it are RAII guards released exactly once on every
//! exit path (match, no match, device error, propagated error, early return):
//!
//! - `Session`: a uniquely named scratch directory under the configured root.
//!   Removed, with anything left inside, when the session drops.
//! - `ScratchFile`: one materialized image inside the session directory.
//!   Removed as soon as the guard drops.
//! - `DeviceLease`: an opened `FrameSource` plus a process-wide exclusive claim
//!   on its device id. Closes the source and drops the claim on release.

use std::cell::Cell;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use anyhow::Result;
use tempfile::{NamedTempFile, TempDir};

use crate::error::AuthError;
use crate::frame::Frame;
use crate::ingest::FrameSource;

const SESSION_PREFIX: &str = "facegate-session-";
const SCRATCH_SUFFIX: &str = ".img";

// ----------------------------------------------------------------------------
// Session: scratch directory scope
// ----------------------------------------------------------------------------

/// Scope of one protocol invocation.
///
/// Not `Sync`: a session belongs to a single synchronous request. Concurrent
/// requests open their own sessions and never share scratch names.
pub struct Session {
    dir: Option<TempDir>,
    id: String,
    live_artifacts: Cell<usize>,
}

impl Session {
    /// Open a session with a fresh scratch directory under `scratch_root`.
    pub fn open(scratch_root: &Path) -> Result<Self, AuthError> {
        std::fs::create_dir_all(scratch_root)?;
        let dir = tempfile::Builder::new()
            .prefix(SESSION_PREFIX)
            .tempdir_in(scratch_root)?;
        let id = dir
            .path()
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.trim_start_matches(SESSION_PREFIX).to_string())
            .unwrap_or_default();
        log::debug!("session {} opened in {}", id, dir.path().display());
        Ok(Self {
            dir: Some(dir),
            id,
            live_artifacts: Cell::new(0),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Scratch directory of this session.
    pub fn dir(&self) -> &Path {
        match &self.dir {
            Some(dir) => dir.path(),
            None => Path::new(""),
        }
    }

    /// Number of scratch files currently held by this session.
    pub fn live_artifacts(&self) -> usize {
        self.live_artifacts.get()
    }

    /// Write image bytes to a uniquely named scratch file.
    pub fn materialize(&self, label: &str, bytes: &[u8]) -> Result<ScratchFile<'_>, AuthError> {
        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}-", label))
            .suffix(SCRATCH_SUFFIX)
            .tempfile_in(self.dir())?;
        file.write_all(bytes)?;
        file.flush()?;
        self.live_artifacts.set(self.live_artifacts.get() + 1);
        Ok(ScratchFile {
            file: Some(file),
            session: self,
        })
    }

    /// Close the session, reporting cleanup errors instead of logging them.
    pub fn close(mut self) -> Result<(), AuthError> {
        match self.dir.take() {
            Some(dir) => {
                dir.close()?;
                log::debug!("session {} closed", self.id);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(err) = dir.close() {
                log::warn!(
                    "session {}: failed to remove scratch dir {}: {}",
                    self.id,
                    path.display(),
                    err
                );
            } else {
                log::debug!("session {} released", self.id);
            }
        }
    }
}

/// One materialized image. The file is removed when the guard drops.
pub struct ScratchFile<'s> {
    file: Option<NamedTempFile>,
    session: &'s Session,
}

impl ScratchFile<'_> {
    pub fn path(&self) -> &Path {
        match &self.file {
            Some(file) => file.path(),
            None => Path::new(""),
        }
    }

    /// Remove the file now, reporting the error if removal fails.
    pub fn release(mut self) -> Result<(), AuthError> {
        self.remove().map_err(AuthError::from)
    }

    fn remove(&mut self) -> std::io::Result<()> {
        match self.file.take() {
            Some(file) => {
                let live = &self.session.live_artifacts;
                live.set(live.get().saturating_sub(1));
                file.close()
            }
            None => Ok(()),
        }
    }
}

impl Drop for ScratchFile<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.remove() {
            log::warn!(
                "session {}: failed to remove scratch file: {}",
                self.session.id,
                err
            );
        }
    }
}

// ----------------------------------------------------------------------------
// DeviceLease: exclusive camera ownership
// ----------------------------------------------------------------------------

fn held_devices() -> &'static Mutex<HashSet<String>> {
    static HELD: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    HELD.get_or_init(|| Mutex::new(HashSet::new()))
}

fn claim_device(device: &str) -> Result<(), AuthError> {
    let mut held = held_devices()
        .lock()
        .map_err(|_| AuthError::DeviceUnavailable("device table lock poisoned".to_string()))?;
    if !held.insert(device.to_string()) {
        return Err(AuthError::DeviceUnavailable(format!(
            "{} is in use by another session",
            device
        )));
    }
    Ok(())
}

fn release_device(device: &str) {
    match held_devices().lock() {
        Ok(mut held) => {
            held.remove(device);
        }
        Err(poisoned) => {
            poisoned.into_inner().remove(device);
        }
    }
}

/// True while some session holds `device`.
pub fn device_in_use(device: &str) -> bool {
    match held_devices().lock() {
        Ok(held) => held.contains(device),
        Err(poisoned) => poisoned.into_inner().contains(device),
    }
}

/// Opened camera with an exclusive claim on its device.
pub struct DeviceLease<'a> {
    source: &'a mut dyn FrameSource,
    device: String,
    released: bool,
}

impl<'a> DeviceLease<'a> {
    /// Claim the device and open the source.
    ///
    /// Fails with `DeviceUnavailable` when another session holds the device
    /// or the source cannot be opened. A failed open still closes the source.
    pub fn acquire(source: &'a mut dyn FrameSource) -> Result<Self, AuthError> {
        let device = source.device_id().to_string();
        claim_device(&device)?;
        let mut lease = Self {
            source,
            device,
            released: false,
        };
        if let Err(err) = lease.source.open() {
            let reason = format!("{}: {:#}", lease.device, err);
            log::warn!("device open failed: {}", reason);
            lease.release();
            return Err(AuthError::DeviceUnavailable(reason));
        }
        log::info!("device {} leased", lease.device);
        Ok(lease)
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.source.next_frame()
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.source.close();
        release_device(&self.device);
        log::info!("device {} released", self.device);
    }
}

impl Drop for DeviceLease<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
