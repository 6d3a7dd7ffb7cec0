use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::clock::Clock;
use super::password::PasswordHasher;
use super::token::{AccessTokenCodec, generate_refresh_value};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Audit, RefreshToken, RefreshTokenState, User};

/// One short-lived access token plus one persisted refresh token,
/// issued together.
#[derive(Debug, Clone, Serialize)]
pub struct SessionPair {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Issues, rotates, and verifies session credentials.
///
/// Access tokens are stateless and verified by signature alone; refresh
/// tokens are persisted, single-use, and replaced atomically on rotation.
pub struct SessionEngine {
    store: Arc<dyn Store>,
    hasher: PasswordHasher,
    codec: AccessTokenCodec,
    clock: Arc<dyn Clock>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionEngine {
    pub fn new(
        store: Arc<dyn Store>,
        secret: &[u8],
        clock: Arc<dyn Clock>,
        access_ttl_minutes: i64,
        refresh_ttl_days: i64,
    ) -> Self {
        Self {
            store,
            hasher: PasswordHasher::new(),
            codec: AccessTokenCodec::new(secret),
            clock,
            access_ttl: Duration::minutes(access_ttl_minutes),
            refresh_ttl: Duration::days(refresh_ttl_days),
        }
    }

    /// Registers a new identity. The email is normalized to lowercase so
    /// later lookups are case-insensitive.
    pub fn register(&self, email: &str, password: &str) -> Result<User> {
        let now = self.clock.now();
        let email = email.to_lowercase();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            password_hash: self.hasher.hash(password)?,
            audit: Audit::new(now, None),
        };

        self.store.create_user(&user)?;
        tracing::info!("registered user {}", user.id);
        Ok(user)
    }

    /// Verifies email + password and issues a fresh session pair.
    /// The error never says which of the two was wrong.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<SessionPair> {
        let user = self
            .store
            .get_user_by_email(email)?
            .ok_or(Error::InvalidCredentials)?;

        let verified = match self.hasher.verify(password, &user.password_hash) {
            Ok(v) => v,
            Err(e) => {
                // Hash-internal failures must not reach the caller.
                tracing::error!("password verification failed for {}: {e}", user.id);
                return Err(Error::InvalidCredentials);
            }
        };

        if !verified {
            return Err(Error::InvalidCredentials);
        }

        self.issue_pair(&user.id)
    }

    /// Consumes an active refresh token and issues a replacement pair.
    ///
    /// Revoke-old and insert-new commit in one transaction; of two racing
    /// rotations of the same token exactly one succeeds and the loser
    /// gets `InvalidOrExpiredToken`. A rotated token never works again.
    pub fn rotate(&self, refresh_value: &str) -> Result<SessionPair> {
        let now = self.clock.now();
        let existing = self
            .store
            .get_refresh_token_by_value(refresh_value)?
            .ok_or(Error::InvalidOrExpiredToken)?;

        if !existing.is_active(now) {
            return Err(Error::InvalidOrExpiredToken);
        }

        let mut attempts = 0;
        loop {
            let replacement = self.new_refresh_token(&existing.user_id, now);
            match self
                .store
                .rotate_refresh_token(&existing.id, &replacement, now)
            {
                Ok(true) => {
                    let (access_token, access_expires_at) =
                        self.new_access_token(&existing.user_id, now)?;
                    return Ok(SessionPair {
                        access_token,
                        access_expires_at,
                        refresh_token: replacement.token,
                        refresh_expires_at: replacement.expires_at,
                    });
                }
                Ok(false) => return Err(Error::InvalidOrExpiredToken),
                Err(Error::ConflictRetryable) if attempts == 0 => {
                    attempts += 1;
                }
                Err(Error::ConflictRetryable) => return Err(Error::TransientStoreFailure),
                Err(e) => return Err(e),
            }
        }
    }

    /// Revokes the matching refresh token. Logout is idempotent: an
    /// unknown or already-revoked token is still Ok.
    pub fn invalidate(&self, refresh_value: &str) -> Result<()> {
        let now = self.clock.now();
        if let Some(token) = self.store.get_refresh_token_by_value(refresh_value)? {
            self.store.revoke_refresh_token(&token.id, now)?;
        }
        Ok(())
    }

    /// Statelessly verifies an access token and returns the subject's
    /// identity id. No store lookup happens here.
    pub fn verify_short_lived(&self, access_token: &str) -> Result<String> {
        let claims = self.codec.decode(access_token)?;
        if claims.is_expired(self.clock.now()) {
            return Err(Error::InvalidOrExpiredToken);
        }
        Ok(claims.sub)
    }

    fn issue_pair(&self, user_id: &str) -> Result<SessionPair> {
        let now = self.clock.now();

        let mut attempts = 0;
        let refresh = loop {
            let refresh = self.new_refresh_token(user_id, now);
            match self.store.create_refresh_token(&refresh) {
                Ok(()) => break refresh,
                Err(Error::ConflictRetryable) if attempts == 0 => attempts += 1,
                Err(Error::ConflictRetryable) => return Err(Error::TransientStoreFailure),
                Err(e) => return Err(e),
            }
        };

        let (access_token, access_expires_at) = self.new_access_token(user_id, now)?;
        Ok(SessionPair {
            access_token,
            access_expires_at,
            refresh_token: refresh.token,
            refresh_expires_at: refresh.expires_at,
        })
    }

    fn new_refresh_token(&self, user_id: &str, now: DateTime<Utc>) -> RefreshToken {
        RefreshToken {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            token: generate_refresh_value(),
            state: RefreshTokenState::Active,
            expires_at: now + self.refresh_ttl,
            revoked_at: None,
            audit: Audit::new(now, Some(user_id.to_string())),
        }
    }

    fn new_access_token(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>)> {
        let expires_at = now + self.access_ttl;
        let token = self.codec.encode(user_id, now, expires_at)?;
        Ok((token, expires_at))
    }
}
