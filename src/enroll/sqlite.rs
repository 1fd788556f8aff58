use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};

use super::intake::NewEnrollment;
use super::EnrollmentStore;
use crate::{BiometricTemplate, Identity};

/// Enrollment store over the `users` table.
///
/// Gallery order is ascending user id, i.e. enrollment order.
pub struct SqliteEnrollmentStore {
    conn: Connection,
}

impl SqliteEnrollmentStore {
    /// Open (and create if needed) the database. `file:` URIs are honored, so
    /// shared in-memory databases work for tests.
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = if db_path.starts_with("file:") {
            Connection::open_with_flags(
                db_path,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI,
            )
        } else {
            Connection::open(db_path)
        }
        .with_context(|| format!("open enrollment db {}", db_path))?;
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL,
              citizenship_number TEXT NOT NULL UNIQUE,
              email TEXT NOT NULL UNIQUE,
              admin INTEGER NOT NULL DEFAULT 0,
              is_blind INTEGER NOT NULL DEFAULT 0,
              is_disabled INTEGER NOT NULL DEFAULT 0,
              image BLOB
            );
            "#,
        )?;
        Ok(())
    }

    /// Insert a new identity with its photo.
    pub fn enroll(&self, enrollment: &NewEnrollment) -> Result<Identity> {
        enrollment.validate()?;
        self.conn
            .execute(
                "INSERT INTO users (name, citizenship_number, email, admin, is_blind, is_disabled, image)
                 VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6)",
                params![
                    enrollment.name,
                    enrollment.citizenship_number,
                    enrollment.email,
                    enrollment.is_blind,
                    enrollment.is_disabled,
                    enrollment.image,
                ],
            )
            .map_err(|e| anyhow!("enrollment rejected for {}: {}", enrollment.email, e))?;
        let id = self.conn.last_insert_rowid();
        log::info!("enrolled identity {}", id);
        Ok(Identity {
            id: id as u64,
            name: enrollment.name.clone(),
            email: enrollment.email.clone(),
            citizenship_number: enrollment.citizenship_number.clone(),
            admin: false,
            is_blind: enrollment.is_blind,
            is_disabled: enrollment.is_disabled,
        })
    }

    /// Replace (or clear, with `None`) the enrolled photo of an identity.
    pub fn set_image(&self, id: u64, image: Option<&[u8]>) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE users SET image = ?1 WHERE id = ?2",
            params![image, id as i64],
        )?;
        if updated == 0 {
            return Err(anyhow!("identity {} not enrolled", id));
        }
        Ok(())
    }
}

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<BiometricTemplate> {
    let id: i64 = row.get(0)?;
    let identity = Identity {
        id: id as u64,
        name: row.get(1)?,
        citizenship_number: row.get(2)?,
        email: row.get(3)?,
        admin: row.get(4)?,
        is_blind: row.get(5)?,
        is_disabled: row.get(6)?,
    };
    let image: Option<Vec<u8>> = row.get(7)?;
    Ok(match image {
        Some(bytes) => BiometricTemplate::new(identity, bytes),
        None => BiometricTemplate::without_image(identity),
    })
}

const SELECT_USERS: &str =
    "SELECT id, name, citizenship_number, email, admin, is_blind, is_disabled, image FROM users";

impl EnrollmentStore for SqliteEnrollmentStore {
    fn get_template(&self, id: u64) -> Result<Option<BiometricTemplate>> {
        let template = self
            .conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_USERS),
                params![id as i64],
                template_from_row,
            )
            .optional()?;
        Ok(template)
    }

    fn list_gallery(&self) -> Result<Vec<BiometricTemplate>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY id ASC", SELECT_USERS))?;
        let rows = stmt.query_map([], template_from_row)?;
        let mut gallery = Vec::new();
        for row in rows {
            gallery.push(row?);
        }
        Ok(gallery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_uri(tag: &str) -> String {
        format!("file:facegate_{}?mode=memory&cache=shared", tag)
    }

    fn enrollment(name: &str, email: &str, citizenship: &str, image: &[u8]) -> NewEnrollment {
        NewEnrollment {
            name: name.to_string(),
            email: email.to_string(),
            citizenship_number: citizenship.to_string(),
            is_blind: false,
            is_disabled: false,
            image: image.to_vec(),
        }
    }

    #[test]
    fn enroll_and_fetch_template() -> Result<()> {
        let store = SqliteEnrollmentStore::open(&memory_uri("fetch"))?;
        let identity = store.enroll(&enrollment("Asha", "asha@example.org", "CZ-1", b"face-a"))?;

        let template = store.get_template(identity.id)?.expect("template");
        assert_eq!(template.identity, identity);
        assert_eq!(template.image(), Some(&b"face-a"[..]));
        assert!(store.get_template(identity.id + 100)?.is_none());
        Ok(())
    }

    #[test]
    fn gallery_follows_enrollment_order() -> Result<()> {
        let store = SqliteEnrollmentStore::open(&memory_uri("order"))?;
        let a = store.enroll(&enrollment("Asha", "asha@example.org", "CZ-1", b"a"))?;
        let b = store.enroll(&enrollment("Bilal", "bilal@example.org", "CZ-2", b"b"))?;
        let c = store.enroll(&enrollment("Chen", "chen@example.org", "CZ-3", b"c"))?;
        store.set_image(b.id, None)?;

        let gallery = store.list_gallery()?;
        let ids: Vec<u64> = gallery.iter().map(|t| t.identity.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
        assert!(gallery[0].has_image());
        assert!(!gallery[1].has_image());
        Ok(())
    }

    #[test]
    fn duplicate_email_is_rejected() -> Result<()> {
        let store = SqliteEnrollmentStore::open(&memory_uri("dup"))?;
        store.enroll(&enrollment("Asha", "asha@example.org", "CZ-1", b"a"))?;
        let err = store
            .enroll(&enrollment("Asha Two", "asha@example.org", "CZ-9", b"b"))
            .unwrap_err();
        assert!(err.to_string().contains("enrollment rejected"));
        Ok(())
    }

    #[test]
    fn set_image_requires_known_identity() -> Result<()> {
        let store = SqliteEnrollmentStore::open(&memory_uri("unknown"))?;
        assert!(store.set_image(42, Some(&b"x"[..])).is_err());
        Ok(())
    }
}
