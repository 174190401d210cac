//! ArchiveService — the ingestion pipeline and the archive record store.
//!
//! One service owns the SQLite pool for record metadata and the two external
//! collaborators: the geocoder and the object storage client. Ingestion
//! resolves the location **before** uploading the file, so a request that
//! cannot produce a record never leaves an orphan object in storage.

use crate::models::archive::{ArchiveRecord, FileType, Marker, NewArchive};
use crate::services::geocoding_service::Geocoder;
use crate::services::storage_service::{ObjectStorage, StorageError};
use bytes::Bytes;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// One incoming upload: the file itself plus a location hint, which is
/// either a free-text address, a coordinate pair, or nothing.
#[derive(Clone, Debug)]
pub struct NewUpload {
    pub bytes: Bytes,
    pub file_name: String,
    pub content_type: Option<String>,
    pub file_type: FileType,
    pub description: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl NewUpload {
    /// The address hint, with blank input counting as absent.
    fn address_hint(&self) -> Option<&str> {
        self.address
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
    }

    /// The coordinate hint. A half pair or a non-finite value counts as
    /// no coordinates, leaving the address branch to apply.
    fn coordinate_hint(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("no location supplied: provide an address or click a point on the map")]
    MissingLocation,
    #[error("could not resolve the supplied location to coordinates")]
    GeocodingFailed,
    #[error("latitude and longitude must form a finite pair or both be absent")]
    InvalidCoordinates,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("record store failure: {0}")]
    RecordStore(#[from] sqlx::Error),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Core operations over archive records:
/// - Ingest an upload (resolve location, store the file remotely, insert
///   one metadata row)
/// - List all records, newest first
/// - Project the geolocated records to map markers
///
/// Records are immutable once created; no update or delete operation is
/// exposed.
#[derive(Clone)]
pub struct ArchiveService {
    /// Shared SQLite connection pool used for record metadata.
    pub db: Arc<SqlitePool>,

    geocoder: Arc<dyn Geocoder>,
    storage: Arc<dyn ObjectStorage>,

    /// Client used to relay stored objects back through `/download`.
    http: reqwest::Client,
}

impl ArchiveService {
    pub fn new(
        db: Arc<SqlitePool>,
        geocoder: Arc<dyn Geocoder>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            db,
            geocoder,
            storage,
            http: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(5))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Whether the storage client has what it needs to attempt uploads.
    pub fn storage_configured(&self) -> bool {
        self.storage.is_configured()
    }

    /// Turn one upload into one durable record.
    ///
    /// Order matters: the location is resolved first, then the file goes to
    /// object storage, then the metadata row is inserted. A failure in the
    /// location phase therefore writes nothing anywhere; a record-store
    /// failure after a successful upload may leave an orphan object behind,
    /// which is accepted.
    pub async fn ingest(&self, upload: NewUpload) -> ArchiveResult<ArchiveRecord> {
        let (latitude, longitude, address) = self.resolve_location(&upload).await?;

        let key = generated_key(&upload.file_name);
        let file_url = self
            .storage
            .upload(&key, upload.content_type.as_deref(), upload.bytes.clone())
            .await?;

        let record = self
            .append(NewArchive {
                file_url,
                file_type: upload.file_type,
                description: upload.description.clone(),
                address,
                latitude: Some(latitude),
                longitude: Some(longitude),
            })
            .await?;

        tracing::info!(
            "ingested archive {} as {} ({})",
            record.id,
            key,
            record.file_type.as_str()
        );
        Ok(record)
    }

    /// Location-completion policy:
    /// 1. Coordinate pair present: use it; derive the address by reverse
    ///    geocoding when none was supplied (total, at worst a placeholder).
    /// 2. Address only: forward geocode; no match fails the ingestion.
    /// 3. Neither: reject before anything is written.
    async fn resolve_location(&self, upload: &NewUpload) -> ArchiveResult<(f64, f64, String)> {
        match (upload.coordinate_hint(), upload.address_hint()) {
            (Some((lat, lon)), Some(address)) => Ok((lat, lon, address.to_string())),
            (Some((lat, lon)), None) => {
                let address = self.geocoder.reverse(lat, lon).await;
                Ok((lat, lon, address))
            }
            (None, Some(address)) => match self.geocoder.forward(address).await {
                Some((lat, lon)) => Ok((lat, lon, address.to_string())),
                None => Err(ArchiveError::GeocodingFailed),
            },
            (None, None) => Err(ArchiveError::MissingLocation),
        }
    }

    /// Insert one record, assigning id and creation timestamp.
    ///
    /// The coordinate-pair invariant is enforced here, once, for every
    /// write path: both present and finite, or both absent.
    async fn append(&self, new: NewArchive) -> ArchiveResult<ArchiveRecord> {
        match (new.latitude, new.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {}
            (None, None) => {}
            _ => return Err(ArchiveError::InvalidCoordinates),
        }

        let row = sqlx::query(
            r#"
            INSERT INTO archives (
                file_url, file_type, description, address, latitude, longitude, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, file_url, file_type, description, address,
                      latitude, longitude, created_at
            "#,
        )
        .bind(&new.file_url)
        .bind(new.file_type.as_str())
        .bind(&new.description)
        .bind(&new.address)
        .bind(new.latitude)
        .bind(new.longitude)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        Ok(record_from_row(&row)?)
    }

    /// Every record, newest first. An empty table yields an empty vec.
    pub async fn list_records(&self) -> ArchiveResult<Vec<ArchiveRecord>> {
        let rows = sqlx::query(
            "SELECT id, file_url, file_type, description, address,
                    latitude, longitude, created_at
             FROM archives
             ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&*self.db)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(record_from_row(row)?);
        }
        Ok(records)
    }

    /// Map markers for every geolocated record, newest first.
    pub async fn markers(&self) -> ArchiveResult<Vec<Marker>> {
        let records = self.list_records().await?;
        Ok(records.iter().filter_map(ArchiveRecord::to_marker).collect())
    }
}

/// Decode one row into a typed record.
///
/// Coordinates decode defensively: a NULL, an undecodable legacy value, or
/// a half pair all normalize to "not geolocated" instead of failing the
/// enumeration. Unknown file-type tags degrade to `other` the same way.
fn record_from_row(row: &SqliteRow) -> Result<ArchiveRecord, sqlx::Error> {
    let latitude = row.try_get::<f64, _>("latitude").ok();
    let longitude = row.try_get::<f64, _>("longitude").ok();
    let (latitude, longitude) = match (latitude, longitude) {
        (Some(lat), Some(lon)) => (Some(lat), Some(lon)),
        _ => (None, None),
    };

    Ok(ArchiveRecord {
        id: row.try_get("id")?,
        file_url: row.try_get("file_url")?,
        file_type: FileType::from_tag(&row.try_get::<String, _>("file_type")?),
        description: row.try_get("description")?,
        address: row.try_get("address")?,
        latitude,
        longitude,
        created_at: row.try_get("created_at")?,
    })
}

/// Collision-resistant storage key: a fresh UUID with the original
/// extension preserved. The user-supplied name is never used as the key,
/// so concurrent uploads of identically named files cannot overwrite each
/// other.
fn generated_key(file_name: &str) -> String {
    match Path::new(file_name).extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", Uuid::new_v4(), ext),
        _ => Uuid::new_v4().to_string(),
    }
}
