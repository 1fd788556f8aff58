//! Enrollment stores.
//!
//! The controllers read templates through `EnrollmentStore` for the duration of
//! one request and never write them back. Two stores are provided:
//! - `InMemoryEnrollmentStore` (tests, fixtures)
//! - `SqliteEnrollmentStore` (the `users` table with the enrolled photo as a blob)

use anyhow::Result;

use crate::BiometricTemplate;

mod intake;
mod sqlite;

pub use intake::{decode_data_uri, NewEnrollment, MAX_IMAGE_BYTES};
pub use sqlite::SqliteEnrollmentStore;

pub trait EnrollmentStore {
    /// Template for one identity, or `None` if the identity is unknown.
    fn get_template(&self, id: u64) -> Result<Option<BiometricTemplate>>;

    /// Every enrolled identity in gallery order.
    fn list_gallery(&self) -> Result<Vec<BiometricTemplate>>;
}

/// Store backed by a vector; gallery order is insertion order.
#[derive(Debug, Default)]
pub struct InMemoryEnrollmentStore {
    templates: Vec<BiometricTemplate>,
}

impl InMemoryEnrollmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_templates(templates: Vec<BiometricTemplate>) -> Self {
        Self { templates }
    }

    pub fn enroll(&mut self, template: BiometricTemplate) {
        self.templates.push(template);
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl EnrollmentStore for InMemoryEnrollmentStore {
    fn get_template(&self, id: u64) -> Result<Option<BiometricTemplate>> {
        Ok(self
            .templates
            .iter()
            .find(|template| template.identity.id == id)
            .cloned())
    }

    fn list_gallery(&self) -> Result<Vec<BiometricTemplate>> {
        Ok(self.templates.clone())
    }
}
