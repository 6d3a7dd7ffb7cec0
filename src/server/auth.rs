use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{
    LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest, SessionResponse, UserResponse,
};
use crate::server::response::{ApiError, ApiResponse};
use crate::server::validation::{validate_email, validate_password};

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    validate_email(&req.email)?;
    validate_password(&req.password)?;

    let user = state
        .sessions
        .register(&req.email, &req.password)
        .map_err(|e| match e {
            Error::AlreadyExists => ApiError::conflict("Email already in use"),
            other => ApiError::from(other),
        })?;

    Ok::<_, ApiError>(Json(ApiResponse::success(UserResponse::from(user))))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let pair = state.sessions.authenticate(&req.email, &req.password)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(SessionResponse::from(pair))))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> impl IntoResponse {
    let pair = state.sessions.rotate(&req.refresh_token)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(SessionResponse::from(pair))))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LogoutRequest>,
) -> impl IntoResponse {
    state.sessions.invalidate(&req.refresh_token)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(())))
}
