use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::header,
    response::IntoResponse,
};
use chrono::Utc;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::access::{can_read, can_share};
use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{PhotoResponse, SharePhotoRequest};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};
use crate::server::validation::validate_title;
use crate::storage::ALLOWED_EXTENSIONS;
use crate::types::{Audit, Photo};

struct Upload {
    data: Vec<u8>,
    original_file_name: String,
    content_type: String,
    title: Option<String>,
}

async fn parse_multipart_upload(multipart: &mut Multipart) -> Result<Upload, ApiError> {
    let mut file: Option<(Vec<u8>, String, String)> = None;
    let mut title: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .ok_or_else(|| ApiError::bad_request("File name is required"))?
                    .to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;
                file = Some((data.to_vec(), file_name, content_type));
            }
            Some("title") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read title: {e}")))?;
                if !value.is_empty() {
                    validate_title(&value)?;
                    title = Some(value);
                }
            }
            _ => {}
        }
    }

    let (data, original_file_name, content_type) =
        file.ok_or_else(|| ApiError::bad_request("File is required"))?;

    if data.is_empty() {
        return Err(ApiError::bad_request("Empty file"));
    }

    Ok(Upload {
        data,
        original_file_name,
        content_type,
        title,
    })
}

fn extension_of(file_name: &str) -> Result<String, ApiError> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ApiError::bad_request("Invalid image type"));
    }

    Ok(extension)
}

pub async fn upload_photo(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let upload = parse_multipart_upload(&mut multipart).await?;
    let extension = extension_of(&upload.original_file_name)?;

    let reference = state
        .photos
        .save(&upload.data, &extension)
        .await
        .map_err(|e| {
            tracing::error!("failed to store photo bytes: {e}");
            ApiError::internal("Failed to store photo")
        })?;

    let now = Utc::now();
    let photo = Photo {
        id: Uuid::new_v4().to_string(),
        owner_id: auth.user_id.clone(),
        file_name: reference.clone(),
        original_file_name: upload.original_file_name,
        content_type: upload.content_type,
        title: upload.title,
        audit: Audit::new(now, Some(auth.user_id.clone())),
    };

    if let Err(e) = state.store.create_photo(&photo) {
        // Don't leave orphaned bytes behind the failed row.
        if let Err(cleanup) = state.photos.delete(&reference).await {
            tracing::warn!("failed to clean up stored bytes {reference}: {cleanup}");
        }
        return Err(ApiError::from(e));
    }

    Ok::<_, ApiError>(Json(ApiResponse::success(PhotoResponse::from_photo(
        photo, true,
    ))))
}

pub async fn download_photo(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if !can_read(state.store.as_ref(), &auth.user_id, &id)? {
        // Missing and forbidden photos answer identically.
        return Err(ApiError::not_found("Photo not found"));
    }

    let photo = state.store.get_photo(&id)?.or_not_found("Photo not found")?;

    let (reader, size) = state.photos.open(&photo.file_name).await.map_err(|e| {
        tracing::error!("failed to open photo bytes {}: {e}", photo.file_name);
        ApiError::internal("Failed to read photo")
    })?;

    let disposition = format!(
        "inline; filename=\"{}\"",
        photo.original_file_name.replace(['"', '\\'], "_")
    );

    let headers = [
        (header::CONTENT_TYPE, photo.content_type.clone()),
        (header::CONTENT_LENGTH, size.to_string()),
        (header::CONTENT_DISPOSITION, disposition),
    ];

    Ok::<_, ApiError>((headers, Body::from_stream(ReaderStream::new(reader))))
}

pub async fn list_owned_photos(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let photos = state.ledger.list_owned(&auth.user_id)?;
    let photos: Vec<PhotoResponse> = photos
        .into_iter()
        .map(|p| PhotoResponse::from_photo(p, true))
        .collect();
    Ok::<_, ApiError>(Json(ApiResponse::success(photos)))
}

pub async fn list_shared_photos(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let photos = state.ledger.list_shared_with_me(&auth.user_id)?;
    let photos: Vec<PhotoResponse> = photos
        .into_iter()
        .map(|p| PhotoResponse::from_photo(p, false))
        .collect();
    Ok::<_, ApiError>(Json(ApiResponse::success(photos)))
}

pub async fn share_photo(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SharePhotoRequest>,
) -> impl IntoResponse {
    if !can_share(state.store.as_ref(), &auth.user_id, &id)? {
        return Err(ApiError::not_found("Photo not found"));
    }

    let grantee = state
        .store
        .get_user_by_email(&req.email)?
        .ok_or_else(|| ApiError::bad_request("Target user not found"))?;

    state
        .ledger
        .grant(&id, &grantee.id, &auth.user_id, Utc::now())?;

    Ok::<_, ApiError>(Json(ApiResponse::success(())))
}
