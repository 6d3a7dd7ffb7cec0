use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{get, post},
};

use super::{auth, photos};
use crate::access::SharingLedger;
use crate::auth::SessionEngine;
use crate::storage::PhotoStorage;
use crate::store::Store;

/// Uploads larger than 10MB are rejected at the body-limit layer.
const MAX_UPLOAD_BYTES: usize = 10_000_000;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub sessions: SessionEngine,
    pub ledger: SharingLedger,
    pub photos: PhotoStorage,
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/auth", auth_router())
        .nest("/api/v1", photo_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

fn auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
}

fn photo_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/photos", post(photos::upload_photo))
        .route("/photos", get(photos::list_owned_photos))
        .route("/photos/shared-with-me", get(photos::list_shared_photos))
        .route("/photos/{id}/download", get(photos::download_photo))
        .route("/photos/{id}/share", post(photos::share_photo))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
