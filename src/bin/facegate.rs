//! facegate - face verification and identification for ballot access
//!
//! Subcommands:
//! 1. `verify`: live 1:1 check of an enrolled identity against the camera
//! 2. `identify`: 1:N search of a captured still image over the gallery
//! 3. `enroll`: add an identity with its photo (base64 data URI file)
//!
//! Decisions are printed as JSON. Exit status: 0 positive decision,
//! 1 negative decision, 2 error.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use face_gate::config::FaceGateConfig;
use face_gate::{
    Authenticator, Camera, CancelToken, DigestOracle, NewEnrollment, OracleRegistry,
    SqliteEnrollmentStore,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify an enrolled identity against the live camera.
    Verify {
        /// Enrolled user id.
        #[arg(long)]
        user: u64,
        /// Camera device (overrides config), e.g. /dev/video0 or stub://desk.
        #[arg(long)]
        camera: Option<String>,
        /// Give up after this many seconds of sampling.
        #[arg(long)]
        max_secs: Option<u64>,
    },
    /// Identify a captured still image against the enrolled gallery.
    Identify {
        /// Image file to identify.
        #[arg(long)]
        image: PathBuf,
    },
    /// Enroll a new identity.
    Enroll {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        citizenship: String,
        /// File holding the photo as a data:image/...;base64, URI.
        #[arg(long)]
        photo: PathBuf,
        #[arg(long)]
        blind: bool,
        #[arg(long)]
        disabled: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            log::error!("{:#}", err);
            ExitCode::from(2)
        }
    }
}

fn run(args: Args) -> Result<bool> {
    let config = FaceGateConfig::load()?;
    let store = SqliteEnrollmentStore::open(&config.db_path)?;

    match args.command {
        Command::Enroll {
            name,
            email,
            citizenship,
            photo,
            blind,
            disabled,
        } => {
            let uri = std::fs::read_to_string(&photo)
                .with_context(|| format!("read photo {}", photo.display()))?;
            let mut enrollment = NewEnrollment::from_data_uri(&name, &email, &citizenship, &uri)?;
            enrollment.is_blind = blind;
            enrollment.is_disabled = disabled;
            let identity = store.enroll(&enrollment)?;
            print_json(&identity)?;
            Ok(true)
        }
        Command::Verify {
            user,
            camera,
            max_secs,
        } => {
            let oracle = oracle_registry().select(&config.oracle)?;
            let mut verification = config.verification.clone();
            if let Some(secs) = max_secs {
                verification.max_duration = Some(Duration::from_secs(secs));
            }
            let mut camera_config = config.camera.clone();
            if let Some(device) = camera {
                camera_config.device = device;
            }

            let auth =
                Authenticator::from_config(store, oracle, &config).with_verification(verification);
            let mut camera = Camera::new(camera_config)?;

            let cancel = CancelToken::new();
            let handler_token = cancel.clone();
            ctrlc::set_handler(move || handler_token.cancel())
                .context("error setting Ctrl-C handler")?;

            log::info!("verifying identity {} (Ctrl-C to stop)", user);
            let response = auth.verify_user(user, &mut camera, &cancel, None)?;
            print_json(&response)?;
            Ok(response.verified)
        }
        Command::Identify { image } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("read image {}", image.display()))?;
            let oracle = oracle_registry().select(&config.oracle)?;
            let auth = Authenticator::from_config(store, oracle, &config);
            let response = auth.identify(&bytes)?;
            print_json(&response)?;
            Ok(response.matched)
        }
    }
}

fn oracle_registry() -> OracleRegistry {
    let mut registry = OracleRegistry::new();
    registry.register(DigestOracle::new());
    registry
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
