//! Enrollment intake: validation of sign-up details and the enrolled photo.
//!
//! Photos arrive as `data:image/(jpeg|jpg|png);base64,<payload>` URIs and are
//! capped at `MAX_IMAGE_BYTES` after decoding.

use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use regex::Regex;

/// Decoded photo size limit (5 MiB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const MIN_NAME_LEN: usize = 3;
const MIN_CITIZENSHIP_LEN: usize = 4;

fn data_uri_prefix() -> &'static Regex {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    PREFIX.get_or_init(|| {
        Regex::new(r"^data:image/(jpeg|jpg|png);base64,").expect("valid data URI regex")
    })
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"))
}

/// Decode an enrolled photo from a base64 data URI.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let uri = uri.trim();
    let prefix = data_uri_prefix()
        .find(uri)
        .ok_or_else(|| anyhow!("invalid image format (expected jpeg or png data URI)"))?;
    let payload = &uri[prefix.end()..];
    let bytes = base64::prelude::BASE64_STANDARD
        .decode(payload)
        .context("failed to decode base64 image")?;
    if bytes.is_empty() {
        return Err(anyhow!("image is empty"));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(anyhow!(
            "image size {} exceeds {} byte limit",
            bytes.len(),
            MAX_IMAGE_BYTES
        ));
    }
    Ok(bytes)
}

/// Sign-up details for a new enrolled identity.
#[derive(Clone, Debug)]
pub struct NewEnrollment {
    pub name: String,
    pub email: String,
    pub citizenship_number: String,
    pub is_blind: bool,
    pub is_disabled: bool,
    /// Decoded photo bytes.
    pub image: Vec<u8>,
}

impl NewEnrollment {
    /// Build an enrollment from a photo data URI.
    pub fn from_data_uri(
        name: &str,
        email: &str,
        citizenship_number: &str,
        photo_uri: &str,
    ) -> Result<Self> {
        let enrollment = Self {
            name: name.trim().to_string(),
            email: email.trim().to_lowercase(),
            citizenship_number: citizenship_number.trim().to_string(),
            is_blind: false,
            is_disabled: false,
            image: decode_data_uri(photo_uri)?,
        };
        enrollment.validate()?;
        Ok(enrollment)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.chars().count() < MIN_NAME_LEN {
            return Err(anyhow!("name must be at least {} characters", MIN_NAME_LEN));
        }
        if !email_pattern().is_match(&self.email) {
            return Err(anyhow!("email is not valid"));
        }
        if self.citizenship_number.chars().count() < MIN_CITIZENSHIP_LEN {
            return Err(anyhow!(
                "citizenship number must be at least {} characters",
                MIN_CITIZENSHIP_LEN
            ));
        }
        if self.image.is_empty() {
            return Err(anyhow!("photo is required"));
        }
        if self.image.len() > MAX_IMAGE_BYTES {
            return Err(anyhow!("image size exceeds {} byte limit", MAX_IMAGE_BYTES));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_uri(kind: &str, bytes: &[u8]) -> String {
        format!(
            "data:image/{};base64,{}",
            kind,
            base64::prelude::BASE64_STANDARD.encode(bytes)
        )
    }

    #[test]
    fn decodes_supported_image_kinds() -> Result<()> {
        for kind in ["jpeg", "jpg", "png"] {
            assert_eq!(decode_data_uri(&data_uri(kind, b"\x89PNG..."))?, b"\x89PNG...");
        }
        Ok(())
    }

    #[test]
    fn rejects_other_prefixes() {
        assert!(decode_data_uri(&data_uri("gif", b"GIF89a")).is_err());
        assert!(decode_data_uri("aGVsbG8=").is_err());
        assert!(decode_data_uri("data:image/png;base64,***").is_err());
    }

    #[test]
    fn rejects_oversized_images() {
        let big = vec![7u8; MAX_IMAGE_BYTES + 1];
        let err = decode_data_uri(&data_uri("jpeg", &big)).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn validates_signup_fields() -> Result<()> {
        let photo = data_uri("png", b"portrait");
        let ok = NewEnrollment::from_data_uri("Asha Rao", " Asha@Example.org ", "CZ-1001", &photo)?;
        assert_eq!(ok.email, "asha@example.org");
        assert_eq!(ok.image, b"portrait");

        assert!(NewEnrollment::from_data_uri("Al", "al@example.org", "CZ-1002", &photo).is_err());
        assert!(NewEnrollment::from_data_uri("Alan", "not-an-email", "CZ-1003", &photo).is_err());
        assert!(NewEnrollment::from_data_uri("Alan", "alan@example.org", "C1", &photo).is_err());
        Ok(())
    }
}
