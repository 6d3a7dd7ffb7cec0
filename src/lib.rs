//! # Darkroom
//!
//! A photo sharing server, usable both as a standalone binary and as a library.
//!
//! Photos are private by default; the owner can grant other users read
//! access one photo at a time. Sessions are a pair of credentials: a
//! short-lived signed access token verified without touching the
//! database, and a persisted single-use refresh token that is atomically
//! rotated.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::path::{Path, PathBuf};
//! use std::sync::Arc;
//! use darkroom::access::SharingLedger;
//! use darkroom::auth::{SessionEngine, SystemClock};
//! use darkroom::server::{AppState, create_router};
//! use darkroom::storage::PhotoStorage;
//! use darkroom::store::{SqliteStore, Store};
//!
//! let store: Arc<dyn Store> = Arc::new(SqliteStore::new("./data/darkroom.db").unwrap());
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState {
//!     store: store.clone(),
//!     sessions: SessionEngine::new(store.clone(), b"secret", Arc::new(SystemClock), 15, 7),
//!     ledger: SharingLedger::new(store.clone()),
//!     photos: PhotoStorage::new(Path::new("./data")),
//! });
//! let router = create_router(state);
//! // Serve with axum...
//! ```

pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod server;
pub mod storage;
pub mod store;
pub mod types;
