use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

const BUSY_TIMEOUT_MS: u32 = 5000;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::configure(conn)
    }

    /// Private per-store database, used by unit tests.
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        // Bound blocking on a locked database; a timeout surfaces as a
        // transient failure instead of a hung request.
        conn.pragma_update(None, "busy_timeout", BUSY_TIMEOUT_MS)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn audit_from_row(row: &Row, offset: usize) -> rusqlite::Result<Audit> {
    Ok(Audit {
        created_at: parse_datetime(&row.get::<_, String>(offset)?),
        modified_at: parse_datetime(&row.get::<_, String>(offset + 1)?),
        created_by: row.get(offset + 2)?,
        modified_by: row.get(offset + 3)?,
    })
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        audit: audit_from_row(row, 3)?,
    })
}

fn refresh_token_from_row(row: &Row) -> rusqlite::Result<RefreshToken> {
    Ok(RefreshToken {
        id: row.get(0)?,
        user_id: row.get(1)?,
        token: row.get(2)?,
        state: RefreshTokenState::parse(&row.get::<_, String>(3)?),
        expires_at: parse_datetime(&row.get::<_, String>(4)?),
        revoked_at: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
        audit: audit_from_row(row, 6)?,
    })
}

fn photo_from_row(row: &Row) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        file_name: row.get(2)?,
        original_file_name: row.get(3)?,
        content_type: row.get(4)?,
        title: row.get(5)?,
        audit: audit_from_row(row, 6)?,
    })
}

const USER_COLUMNS: &str = "id, email, password_hash, created_at, modified_at, created_by, modified_by";
const REFRESH_TOKEN_COLUMNS: &str =
    "id, user_id, token, state, expires_at, revoked_at, created_at, modified_at, created_by, modified_by";
const PHOTO_COLUMNS: &str =
    "id, owner_id, file_name, original_file_name, content_type, title, created_at, modified_at, created_by, modified_by";

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO users (id, email, password_hash, created_at, modified_at, created_by, modified_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id,
                user.email,
                user.password_hash,
                format_datetime(&user.audit.created_at),
                format_datetime(&user.audit.modified_at),
                user.audit.created_by,
                user.audit.modified_by,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::AlreadyExists)
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email.to_lowercase()],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    // Refresh token operations

    fn create_refresh_token(&self, token: &RefreshToken) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO refresh_tokens (id, user_id, token, state, expires_at, revoked_at, created_at, modified_at, created_by, modified_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                token.id,
                token.user_id,
                token.token,
                token.state.as_str(),
                format_datetime(&token.expires_at),
                token.revoked_at.as_ref().map(format_datetime),
                format_datetime(&token.audit.created_at),
                format_datetime(&token.audit.modified_at),
                token.audit.created_by,
                token.audit.modified_by,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                // Token value collision; the caller regenerates and retries.
                Err(Error::ConflictRetryable)
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_refresh_token_by_value(&self, value: &str) -> Result<Option<RefreshToken>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {REFRESH_TOKEN_COLUMNS} FROM refresh_tokens WHERE token = ?1"),
            params![value],
            refresh_token_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn revoke_refresh_token(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let rows = self.conn().execute(
            "UPDATE refresh_tokens
             SET state = 'revoked', revoked_at = ?1, modified_at = ?1
             WHERE id = ?2 AND state = 'active'",
            params![format_datetime(&now), id],
        )?;
        Ok(rows > 0)
    }

    fn rotate_refresh_token(
        &self,
        old_id: &str,
        replacement: &RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        // Conditional revoke: of two racing rotations only one sees an
        // active row here, so only one replacement is ever inserted.
        let revoked = tx.execute(
            "UPDATE refresh_tokens
             SET state = 'revoked', revoked_at = ?1, modified_at = ?1
             WHERE id = ?2 AND state = 'active'",
            params![format_datetime(&now), old_id],
        )?;

        if revoked == 0 {
            // Nothing to commit; the old token already lost its race.
            return Ok(false);
        }

        let inserted = tx.execute(
            "INSERT INTO refresh_tokens (id, user_id, token, state, expires_at, revoked_at, created_at, modified_at, created_by, modified_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                replacement.id,
                replacement.user_id,
                replacement.token,
                replacement.state.as_str(),
                format_datetime(&replacement.expires_at),
                replacement.revoked_at.as_ref().map(format_datetime),
                format_datetime(&replacement.audit.created_at),
                format_datetime(&replacement.audit.modified_at),
                replacement.audit.created_by,
                replacement.audit.modified_by,
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                // Rolls back the revoke as well, leaving the old token usable.
                return Err(Error::ConflictRetryable);
            }
            Err(e) => return Err(Error::from(e)),
        }

        tx.commit()?;
        Ok(true)
    }

    // Photo operations

    fn create_photo(&self, photo: &Photo) -> Result<()> {
        self.conn().execute(
            "INSERT INTO photos (id, owner_id, file_name, original_file_name, content_type, title, created_at, modified_at, created_by, modified_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                photo.id,
                photo.owner_id,
                photo.file_name,
                photo.original_file_name,
                photo.content_type,
                photo.title,
                format_datetime(&photo.audit.created_at),
                format_datetime(&photo.audit.modified_at),
                photo.audit.created_by,
                photo.audit.modified_by,
            ],
        )?;
        Ok(())
    }

    fn get_photo(&self, id: &str) -> Result<Option<Photo>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?1"),
            params![id],
            photo_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_owned_photos(&self, owner_id: &str) -> Result<Vec<Photo>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE owner_id = ?1
             ORDER BY created_at DESC, id ASC"
        ))?;

        let rows = stmt.query_map(params![owner_id], photo_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_shared_photos(&self, grantee_id: &str) -> Result<Vec<Photo>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT p.id, p.owner_id, p.file_name, p.original_file_name, p.content_type, p.title,
                    p.created_at, p.modified_at, p.created_by, p.modified_by
             FROM photos p
             JOIN share_grants sg ON sg.photo_id = p.id
             WHERE sg.grantee_id = ?1
             ORDER BY p.created_at DESC, p.id ASC",
        )?;

        let rows = stmt.query_map(params![grantee_id], photo_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_photo(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM photos WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Share grant operations

    fn insert_share_grant(&self, grant: &ShareGrant) -> Result<bool> {
        let rows = self.conn().execute(
            "INSERT INTO share_grants (photo_id, grantee_id, created_at, modified_at, created_by, modified_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (photo_id, grantee_id) DO NOTHING",
            params![
                grant.photo_id,
                grant.grantee_id,
                format_datetime(&grant.audit.created_at),
                format_datetime(&grant.audit.modified_at),
                grant.audit.created_by,
                grant.audit.modified_by,
            ],
        )?;
        Ok(rows > 0)
    }

    fn get_share_grant(&self, photo_id: &str, grantee_id: &str) -> Result<Option<ShareGrant>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT photo_id, grantee_id, created_at, modified_at, created_by, modified_by
             FROM share_grants WHERE photo_id = ?1 AND grantee_id = ?2",
            params![photo_id, grantee_id],
            |row| {
                Ok(ShareGrant {
                    photo_id: row.get(0)?,
                    grantee_id: row.get(1)?,
                    audit: audit_from_row(row, 2)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn count_share_grants(&self, photo_id: &str) -> Result<i64> {
        let conn = self.conn();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM share_grants WHERE photo_id = ?1",
            params![photo_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn test_store() -> SqliteStore {
        let store = SqliteStore::new_in_memory().unwrap();
        store.initialize().unwrap();
        store
    }

    fn test_user(email: &str) -> User {
        User {
            id: Uuid::new_v4().to_string(),
            email: email.to_lowercase(),
            password_hash: "$argon2id$fake".to_string(),
            audit: Audit::new(Utc::now(), None),
        }
    }

    fn test_refresh_token(user_id: &str, value: &str) -> RefreshToken {
        let now = Utc::now();
        RefreshToken {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            token: value.to_string(),
            state: RefreshTokenState::Active,
            expires_at: now + Duration::days(7),
            revoked_at: None,
            audit: Audit::new(now, Some(user_id.to_string())),
        }
    }

    fn test_photo(owner_id: &str) -> Photo {
        Photo {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            file_name: format!("{}.jpg", Uuid::new_v4()),
            original_file_name: "holiday.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            title: None,
            audit: Audit::new(Utc::now(), Some(owner_id.to_string())),
        }
    }

    #[test]
    fn test_user_email_lookup_is_case_insensitive() {
        let store = test_store();
        let user = test_user("Alice@Example.com");
        store.create_user(&user).unwrap();

        let found = store.get_user_by_email("ALICE@example.COM").unwrap();
        assert_eq!(found.unwrap().id, user.id);
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let store = test_store();
        store.create_user(&test_user("a@example.com")).unwrap();

        let result = store.create_user(&test_user("a@example.com"));
        assert!(matches!(result, Err(Error::AlreadyExists)));
    }

    #[test]
    fn test_rotate_refresh_token_single_use() {
        let store = test_store();
        let user = test_user("a@example.com");
        store.create_user(&user).unwrap();

        let old = test_refresh_token(&user.id, "old-token");
        store.create_refresh_token(&old).unwrap();

        let now = Utc::now();
        let first = test_refresh_token(&user.id, "new-token-1");
        assert!(store.rotate_refresh_token(&old.id, &first, now).unwrap());

        // Second rotation of the same old token finds no active row.
        let second = test_refresh_token(&user.id, "new-token-2");
        assert!(!store.rotate_refresh_token(&old.id, &second, now).unwrap());

        let stored = store
            .get_refresh_token_by_value("old-token")
            .unwrap()
            .unwrap();
        assert_eq!(stored.state, RefreshTokenState::Revoked);
        assert!(stored.revoked_at.is_some());

        assert!(
            store
                .get_refresh_token_by_value("new-token-1")
                .unwrap()
                .is_some()
        );
        assert!(
            store
                .get_refresh_token_by_value("new-token-2")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_rotate_rolls_back_on_token_value_collision() {
        let store = test_store();
        let user = test_user("a@example.com");
        store.create_user(&user).unwrap();

        let old = test_refresh_token(&user.id, "old-token");
        store.create_refresh_token(&old).unwrap();
        let taken = test_refresh_token(&user.id, "taken");
        store.create_refresh_token(&taken).unwrap();

        let colliding = test_refresh_token(&user.id, "taken");
        let result = store.rotate_refresh_token(&old.id, &colliding, Utc::now());
        assert!(matches!(result, Err(Error::ConflictRetryable)));

        // Revoke must not have committed.
        let stored = store
            .get_refresh_token_by_value("old-token")
            .unwrap()
            .unwrap();
        assert_eq!(stored.state, RefreshTokenState::Active);
    }

    #[test]
    fn test_revoke_is_idempotent_signal() {
        let store = test_store();
        let user = test_user("a@example.com");
        store.create_user(&user).unwrap();

        let token = test_refresh_token(&user.id, "tok");
        store.create_refresh_token(&token).unwrap();

        assert!(store.revoke_refresh_token(&token.id, Utc::now()).unwrap());
        assert!(!store.revoke_refresh_token(&token.id, Utc::now()).unwrap());
    }

    #[test]
    fn test_share_grant_insert_is_idempotent() {
        let store = test_store();
        let owner = test_user("owner@example.com");
        let grantee = test_user("grantee@example.com");
        store.create_user(&owner).unwrap();
        store.create_user(&grantee).unwrap();

        let photo = test_photo(&owner.id);
        store.create_photo(&photo).unwrap();

        let grant = ShareGrant {
            photo_id: photo.id.clone(),
            grantee_id: grantee.id.clone(),
            audit: Audit::new(Utc::now(), Some(owner.id.clone())),
        };

        assert!(store.insert_share_grant(&grant).unwrap());
        assert!(!store.insert_share_grant(&grant).unwrap());
        assert_eq!(store.count_share_grants(&photo.id).unwrap(), 1);
    }

    #[test]
    fn test_photo_listing_order_is_deterministic() {
        let store = test_store();
        let owner = test_user("owner@example.com");
        store.create_user(&owner).unwrap();

        let now = Utc::now();
        let mut older = test_photo(&owner.id);
        older.id = "b-older".to_string();
        older.audit.created_at = now - Duration::hours(1);

        // Two photos sharing a timestamp break the tie by id ascending.
        let mut tied_a = test_photo(&owner.id);
        tied_a.id = "a-tied".to_string();
        tied_a.audit.created_at = now;
        let mut tied_c = test_photo(&owner.id);
        tied_c.id = "c-tied".to_string();
        tied_c.audit.created_at = now;

        store.create_photo(&tied_c).unwrap();
        store.create_photo(&older).unwrap();
        store.create_photo(&tied_a).unwrap();

        let photos = store.list_owned_photos(&owner.id).unwrap();
        let ids: Vec<&str> = photos.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a-tied", "c-tied", "b-older"]);
    }

    #[test]
    fn test_delete_photo_cascades_grants() {
        let store = test_store();
        let owner = test_user("owner@example.com");
        let grantee = test_user("grantee@example.com");
        store.create_user(&owner).unwrap();
        store.create_user(&grantee).unwrap();

        let photo = test_photo(&owner.id);
        store.create_photo(&photo).unwrap();
        store
            .insert_share_grant(&ShareGrant {
                photo_id: photo.id.clone(),
                grantee_id: grantee.id.clone(),
                audit: Audit::new(Utc::now(), Some(owner.id.clone())),
            })
            .unwrap();

        assert!(store.delete_photo(&photo.id).unwrap());
        assert!(!store.delete_photo(&photo.id).unwrap());
        assert_eq!(store.count_share_grants(&photo.id).unwrap(), 0);
    }

    #[test]
    fn test_shared_listing_only_includes_granted_photos() {
        let store = test_store();
        let owner = test_user("owner@example.com");
        let grantee = test_user("grantee@example.com");
        store.create_user(&owner).unwrap();
        store.create_user(&grantee).unwrap();

        let shared = test_photo(&owner.id);
        let private = test_photo(&owner.id);
        store.create_photo(&shared).unwrap();
        store.create_photo(&private).unwrap();

        store
            .insert_share_grant(&ShareGrant {
                photo_id: shared.id.clone(),
                grantee_id: grantee.id.clone(),
                audit: Audit::new(Utc::now(), Some(owner.id.clone())),
            })
            .unwrap();

        let photos = store.list_shared_photos(&grantee.id).unwrap();
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].id, shared.id);

        assert!(store.list_shared_photos(&owner.id).unwrap().is_empty());
    }
}
