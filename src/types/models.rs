use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit trail embedded in every persisted record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audit {
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
}

impl Audit {
    #[must_use]
    pub fn new(now: DateTime<Utc>, actor: Option<String>) -> Self {
        Self {
            created_at: now,
            modified_at: now,
            created_by: actor.clone(),
            modified_by: actor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Stored lowercase; lookups are case-insensitive.
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(flatten)]
    pub audit: Audit,
}

/// Stored lifecycle of a refresh token. Expiry is never stored as state;
/// it is computed from the clock at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshTokenState {
    Active,
    Revoked,
}

impl RefreshTokenState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
        }
    }

    /// Unknown values read back as revoked so a corrupt row can never
    /// resurrect a usable token.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            _ => Self::Revoked,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: String,
    pub user_id: String,
    #[serde(skip)]
    pub token: String,
    pub state: RefreshTokenState,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub audit: Audit,
}

impl RefreshToken {
    /// Active means not explicitly revoked and not past expiry.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.state == RefreshTokenState::Active && now < self.expires_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    pub owner_id: String,
    /// Opaque reference into byte storage; never a user-supplied path.
    #[serde(skip)]
    pub file_name: String,
    pub original_file_name: String,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareGrant {
    pub photo_id: String,
    pub grantee_id: String,
    #[serde(flatten)]
    pub audit: Audit,
}
