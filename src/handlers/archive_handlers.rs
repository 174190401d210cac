//! HTTP handlers for uploading archives and reading them back.
//! Extracts the multipart upload form, delegates ingestion and listing to
//! `ArchiveService`, and relays stored objects without buffering them.

use crate::{
    errors::AppError,
    models::archive::{FileEntry, FileType, url_basename},
    services::archive_service::{ArchiveService, NewUpload},
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;
use std::io;

/// Query params accepted by `GET /download`.
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub url: Option<String>,
    pub filename: Option<String>,
}

/// Upload one media file with its location hint: `POST /upload`.
///
/// Multipart fields: `file` (required), `file_type`, `description`,
/// `address`, `latitude`, `longitude`. Blank text fields count as absent.
pub async fn upload_archive(
    State(service): State<ArchiveService>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut file: Option<(Bytes, String, Option<String>)> = None;
    let mut file_type = FileType::Other;
    let mut description = String::new();
    let mut address: Option<String> = None;
    let mut latitude: Option<f64> = None;
    let mut longitude: Option<f64> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("invalid multipart body: {}", err)))?
    {
        match field.name().unwrap_or_default().to_string().as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.bin").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|err| {
                    AppError::bad_request(format!("failed to read file field: {}", err))
                })?;
                file = Some((bytes, file_name, content_type));
            }
            "file_type" => {
                file_type = FileType::from_tag(text_field(field).await?.trim());
            }
            "description" => {
                description = text_field(field).await?;
            }
            "address" => {
                address = Some(text_field(field).await?);
            }
            "latitude" => {
                latitude = parse_coordinate(&text_field(field).await?, "latitude")?;
            }
            "longitude" => {
                longitude = parse_coordinate(&text_field(field).await?, "longitude")?;
            }
            _ => {}
        }
    }

    let (bytes, file_name, content_type) =
        file.ok_or_else(|| AppError::bad_request("the `file` field is required"))?;

    let record = service
        .ingest(NewUpload {
            bytes,
            file_name,
            content_type,
            file_type,
            description,
            address,
            latitude,
            longitude,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// Map markers for every geolocated record: `GET /markers`.
pub async fn get_markers(
    State(service): State<ArchiveService>,
) -> Result<impl IntoResponse, AppError> {
    let markers = service.markers().await?;
    Ok(Json(markers))
}

/// All uploaded files, newest first: `GET /files`.
pub async fn file_list(
    State(service): State<ArchiveService>,
) -> Result<impl IntoResponse, AppError> {
    let records = service.list_records().await?;
    let files: Vec<FileEntry> = records.iter().map(|r| r.to_file_entry()).collect();
    Ok(Json(files))
}

/// Relay a stored object as an attachment download: `GET /download?url=`.
///
/// The upstream `Content-Type` and `Content-Length` are preserved; the
/// attachment filename falls back to the basename of the URL path.
pub async fn download_file(
    State(service): State<ArchiveService>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    let raw_url = query
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("the `url` query parameter is required"))?;
    // Browsers sometimes hand the URL back percent-encoded a second time.
    let file_url = urlencoding::decode(&raw_url)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(raw_url);

    let filename = query
        .filename
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| url_basename(&file_url));

    let upstream = service
        .http()
        .get(&file_url)
        .send()
        .await
        .and_then(|resp| resp.error_for_status())
        .map_err(|err| {
            AppError::new(
                StatusCode::BAD_GATEWAY,
                format!("failed to fetch stored object: {}", err),
            )
        })?;

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let content_length = upstream.content_length();

    let stream = upstream
        .bytes_stream()
        .map(|chunk| chunk.map_err(io::Error::other));
    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    if let Some(length) = content_length {
        headers.insert(
            header::CONTENT_LENGTH,
            HeaderValue::from_str(&length.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("0")),
        );
    }
    let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', ""));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

async fn text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    let name = field.name().unwrap_or_default().to_string();
    field
        .text()
        .await
        .map_err(|err| AppError::bad_request(format!("failed to read `{}` field: {}", name, err)))
}

/// Parse an optional coordinate form field. Blank means absent; anything
/// else must be a finite number.
fn parse_coordinate(raw: &str, name: &str) -> Result<Option<f64>, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value: f64 = trimmed
        .parse()
        .map_err(|_| AppError::bad_request(format!("`{}` must be a number", name)))?;
    if !value.is_finite() {
        return Err(AppError::bad_request(format!(
            "`{}` must be a finite number",
            name
        )));
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_coordinates_count_as_absent() {
        assert_eq!(parse_coordinate("", "latitude").unwrap(), None);
        assert_eq!(parse_coordinate("   ", "latitude").unwrap(), None);
        assert_eq!(parse_coordinate("35.69", "latitude").unwrap(), Some(35.69));
        assert_eq!(parse_coordinate(" 139.75 ", "longitude").unwrap(), Some(139.75));
    }

    #[test]
    fn malformed_coordinates_are_rejected() {
        assert!(parse_coordinate("north", "latitude").is_err());
        assert!(parse_coordinate("NaN", "latitude").is_err());
        assert!(parse_coordinate("inf", "longitude").is_err());
    }
}
