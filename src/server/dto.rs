use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::SessionPair;
use crate::types::{Photo, User};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct SharePhotoRequest {
    /// Email of the user to share with.
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_at: user.audit.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

impl From<SessionPair> for SessionResponse {
    fn from(pair: SessionPair) -> Self {
        Self {
            access_token: pair.access_token,
            access_expires_at: pair.access_expires_at,
            refresh_token: pair.refresh_token,
            refresh_expires_at: pair.refresh_expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub original_file_name: String,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub is_owner: bool,
}

impl PhotoResponse {
    #[must_use]
    pub fn from_photo(photo: Photo, is_owner: bool) -> Self {
        Self {
            id: photo.id,
            title: photo.title,
            original_file_name: photo.original_file_name,
            content_type: photo.content_type,
            uploaded_at: photo.audit.created_at,
            is_owner,
        }
    }
}
