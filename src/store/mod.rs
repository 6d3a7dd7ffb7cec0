mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    // Refresh token operations
    fn create_refresh_token(&self, token: &RefreshToken) -> Result<()>;
    fn get_refresh_token_by_value(&self, value: &str) -> Result<Option<RefreshToken>>;
    /// Terminal revocation write. Returns false if the token was not
    /// active (already revoked or unknown).
    fn revoke_refresh_token(&self, id: &str, now: DateTime<Utc>) -> Result<bool>;
    /// Revokes the old token and inserts its replacement in a single
    /// transaction. Returns false (and inserts nothing) if the old token
    /// was no longer active, so exactly one of two racing rotations wins.
    fn rotate_refresh_token(
        &self,
        old_id: &str,
        replacement: &RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    // Photo operations
    fn create_photo(&self, photo: &Photo) -> Result<()>;
    fn get_photo(&self, id: &str) -> Result<Option<Photo>>;
    fn list_owned_photos(&self, owner_id: &str) -> Result<Vec<Photo>>;
    fn list_shared_photos(&self, grantee_id: &str) -> Result<Vec<Photo>>;
    fn delete_photo(&self, id: &str) -> Result<bool>;

    // Share grant operations
    /// Insert-if-absent. Returns true if a row was created, false if the
    /// grant already existed.
    fn insert_share_grant(&self, grant: &ShareGrant) -> Result<bool>;
    fn get_share_grant(&self, photo_id: &str, grantee_id: &str) -> Result<Option<ShareGrant>>;
    fn count_share_grants(&self, photo_id: &str) -> Result<i64>;

    fn close(&self) -> Result<()>;
}
