use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Audit, Photo, ShareGrant};

/// Records and queries share grants. Grants have no expiry and no revoke
/// path; granting twice is a no-op.
pub struct SharingLedger {
    store: Arc<dyn Store>,
}

impl SharingLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Idempotent insert-if-absent of a grant, recorded as made by
    /// `granted_by`. Duplicate grants converge to one row without error.
    pub fn grant(
        &self,
        photo_id: &str,
        grantee_id: &str,
        granted_by: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let grant = ShareGrant {
            photo_id: photo_id.to_string(),
            grantee_id: grantee_id.to_string(),
            audit: Audit::new(now, Some(granted_by.to_string())),
        };

        let mut attempts = 0;
        loop {
            match self.store.insert_share_grant(&grant) {
                // Created or already present are both success.
                Ok(_) => return Ok(()),
                Err(Error::ConflictRetryable) if attempts == 0 => attempts += 1,
                Err(Error::ConflictRetryable) => return Err(Error::TransientStoreFailure),
                Err(e) => return Err(e),
            }
        }
    }

    /// Photos owned by the identity, newest first, ids ascending on ties.
    pub fn list_owned(&self, identity_id: &str) -> Result<Vec<Photo>> {
        self.store.list_owned_photos(identity_id)
    }

    /// Photos shared with the identity, same ordering rule.
    pub fn list_shared_with_me(&self, identity_id: &str) -> Result<Vec<Photo>> {
        self.store.list_shared_photos(identity_id)
    }
}
