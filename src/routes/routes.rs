//! Defines routes for the archive API.
//!
//! ## Structure
//! - **Archive endpoints**
//!   - `POST /upload`   — upload one media file with its location hint
//!   - `GET  /markers`  — map markers for every geolocated record
//!   - `GET  /files`    — all uploaded files, newest first
//!   - `GET  /download` — relay a stored object as an attachment
//!
//! - **Health endpoints**
//!   - `GET  /healthz`  — liveness
//!   - `GET  /readyz`   — readiness (DB + storage configuration)

use crate::{
    handlers::{
        archive_handlers::{download_file, file_list, get_markers, upload_archive},
        health_handlers::{healthz, readyz},
    },
    services::archive_service::ArchiveService,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build and return the router for all archive routes.
///
/// The router carries shared state (`ArchiveService`) to all handlers.
pub fn routes() -> Router<ArchiveService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // archive endpoints
        .route("/upload", post(upload_archive))
        .route("/markers", get(get_markers))
        .route("/files", get(file_list))
        .route("/download", get(download_file))
}
