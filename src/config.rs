use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::gallery::SearchConfig;
use crate::ingest::CameraConfig;
use crate::threshold::{ThresholdPolicy, DEFAULT_LOWER, DEFAULT_SCALE, DEFAULT_UPPER};
use crate::verification::{VerificationConfig, DEFAULT_SAMPLE_STRIDE, DEFAULT_WARMUP};

const DEFAULT_DB_PATH: &str = "facegate.db";
const DEFAULT_SCRATCH_DIR: &str = "facegate-scratch";
const DEFAULT_CAMERA: &str = "/dev/video0";
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_ORACLE: &str = "digest";

#[derive(Debug, Deserialize, Default)]
struct FaceGateConfigFile {
    db_path: Option<String>,
    scratch_dir: Option<PathBuf>,
    oracle: Option<String>,
    camera: Option<CameraConfigFile>,
    verification: Option<VerificationConfigFile>,
    threshold: Option<ThresholdConfigFile>,
    search: Option<SearchConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct VerificationConfigFile {
    warmup_ms: Option<u64>,
    sample_stride: Option<u64>,
    max_frames: Option<u64>,
    max_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdConfigFile {
    scale: Option<f64>,
    lower: Option<f64>,
    upper: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct SearchConfigFile {
    relaxed_detection: Option<bool>,
    apply_threshold: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct FaceGateConfig {
    pub db_path: String,
    pub scratch_dir: PathBuf,
    pub oracle: String,
    pub camera: CameraConfig,
    pub verification: VerificationConfig,
    pub threshold: ThresholdPolicy,
    pub search: SearchConfig,
}

impl FaceGateConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FACEGATE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: FaceGateConfigFile) -> Result<Self> {
        let db_path = file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let scratch_dir = file
            .scratch_dir
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_SCRATCH_DIR));
        let oracle = file.oracle.unwrap_or_else(|| DEFAULT_ORACLE.to_string());

        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraConfig {
            device: camera_file
                .device
                .unwrap_or_else(|| DEFAULT_CAMERA.to_string()),
            target_fps: camera_file.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
            width: camera_file.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
            frame_limit: None,
        };

        let verification_file = file.verification.unwrap_or_default();
        let verification = VerificationConfig {
            warmup: verification_file
                .warmup_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_WARMUP),
            sample_stride: verification_file
                .sample_stride
                .unwrap_or(DEFAULT_SAMPLE_STRIDE),
            max_frames: verification_file.max_frames,
            max_duration: verification_file.max_secs.map(Duration::from_secs),
        };

        let threshold_file = file.threshold.unwrap_or_default();
        let threshold = ThresholdPolicy::new(
            threshold_file.scale.unwrap_or(DEFAULT_SCALE),
            threshold_file.lower.unwrap_or(DEFAULT_LOWER),
            threshold_file.upper.unwrap_or(DEFAULT_UPPER),
        )?;

        let search_file = file.search.unwrap_or_default();
        let defaults = SearchConfig::default();
        let search = SearchConfig {
            relaxed_detection: search_file
                .relaxed_detection
                .unwrap_or(defaults.relaxed_detection),
            apply_threshold: search_file
                .apply_threshold
                .unwrap_or(defaults.apply_threshold),
        };

        Ok(Self {
            db_path,
            scratch_dir,
            oracle,
            camera,
            verification,
            threshold,
            search,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = non_empty_env("FACEGATE_DB_PATH") {
            self.db_path = path;
        }
        if let Some(dir) = non_empty_env("FACEGATE_SCRATCH_DIR") {
            self.scratch_dir = PathBuf::from(dir);
        }
        if let Some(device) = non_empty_env("FACEGATE_CAMERA") {
            self.camera.device = device;
        }
        if let Some(oracle) = non_empty_env("FACEGATE_ORACLE") {
            self.oracle = oracle;
        }
        if let Some(warmup) = non_empty_env("FACEGATE_WARMUP_MS") {
            let ms: u64 = warmup
                .parse()
                .map_err(|_| anyhow!("FACEGATE_WARMUP_MS must be an integer number of milliseconds"))?;
            self.verification.warmup = Duration::from_millis(ms);
        }
        if let Some(stride) = non_empty_env("FACEGATE_SAMPLE_STRIDE") {
            self.verification.sample_stride = stride
                .parse()
                .map_err(|_| anyhow!("FACEGATE_SAMPLE_STRIDE must be a positive integer"))?;
        }
        if let Some(frames) = non_empty_env("FACEGATE_MAX_FRAMES") {
            let frames: u64 = frames
                .parse()
                .map_err(|_| anyhow!("FACEGATE_MAX_FRAMES must be an integer"))?;
            self.verification.max_frames = Some(frames);
        }
        if let Some(secs) = non_empty_env("FACEGATE_MAX_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| anyhow!("FACEGATE_MAX_SECS must be an integer number of seconds"))?;
            self.verification.max_duration = Some(Duration::from_secs(secs));
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.verification.sample_stride == 0 {
            return Err(anyhow!("sample_stride must be greater than zero"));
        }
        if self.verification.max_frames == Some(0) {
            return Err(anyhow!("max_frames must be greater than zero when set"));
        }
        if self.verification.max_duration == Some(Duration::ZERO) {
            return Err(anyhow!("max_secs must be greater than zero when set"));
        }
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        self.oracle = self.oracle.trim().to_lowercase();
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<FaceGateConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
