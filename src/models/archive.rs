//! Represents one uploaded media item and its geographic location.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display format for upload timestamps in the read projections.
const UPLOAD_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Declared kind of an uploaded file.
///
/// The tag is supplied by the client and stored verbatim; no content
/// sniffing is performed. Unknown tags degrade to `Other` instead of
/// failing, both at the form boundary and when reading legacy rows.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Video,
    Audio,
    Other,
}

impl FileType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "image" => FileType::Image,
            "video" => FileType::Video,
            "audio" => FileType::Audio,
            _ => FileType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Image => "image",
            FileType::Video => "video",
            FileType::Audio => "audio",
            FileType::Other => "other",
        }
    }
}

/// A persisted archive entry.
///
/// Rows are created once by the ingestion pipeline and never mutated.
/// A record is either fully geolocated (both coordinates present) or not
/// geolocated at all; the row decoder in the service layer enforces this,
/// so a half pair never reaches this type.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ArchiveRecord {
    /// Server-assigned row id.
    pub id: i64,

    /// Public URL of the stored binary.
    pub file_url: String,

    /// Declared kind of the file.
    pub file_type: FileType,

    /// Free-text description; may be empty.
    pub description: String,

    /// Display address; may be empty.
    pub address: String,

    /// Latitude, present only together with `longitude`.
    pub latitude: Option<f64>,

    /// Longitude, present only together with `latitude`.
    pub longitude: Option<f64>,

    /// Server-assigned creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl ArchiveRecord {
    /// Both coordinates, or nothing.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    pub fn is_geolocated(&self) -> bool {
        self.coordinates().is_some()
    }

    /// Basename of the stored file, derived from the URL path.
    pub fn file_name(&self) -> String {
        url_basename(&self.file_url)
    }

    pub fn to_file_entry(&self) -> FileEntry {
        FileEntry {
            file_name: self.file_name(),
            file_type: self.file_type,
            description: self.description.clone(),
            address: self.address.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            upload_date: self.created_at.format(UPLOAD_DATE_FORMAT).to_string(),
            file_url: self.file_url.clone(),
        }
    }

    /// Marker projection; `None` for records without coordinates.
    pub fn to_marker(&self) -> Option<Marker> {
        let (latitude, longitude) = self.coordinates()?;
        Some(Marker {
            latitude,
            longitude,
            address: self.address.clone(),
            file_type: self.file_type,
            description: self.description.clone(),
            file_name: self.file_name(),
            file_url: self.file_url.clone(),
            upload_date: self.created_at.format(UPLOAD_DATE_FORMAT).to_string(),
        })
    }
}

/// Insert payload for a new archive entry. Id and timestamp are assigned
/// by the store.
#[derive(Clone, Debug)]
pub struct NewArchive {
    pub file_url: String,
    pub file_type: FileType,
    pub description: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// One row of the file-list view.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FileEntry {
    pub file_name: String,
    pub file_type: FileType,
    pub description: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub upload_date: String,
    pub file_url: String,
}

/// One map marker. Only geolocated records project to markers.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Marker {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub file_type: FileType,
    pub description: String,
    pub file_name: String,
    pub file_url: String,
    pub upload_date: String,
}

/// Last path segment of a URL, ignoring query string and fragment.
pub fn url_basename(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(lat: Option<f64>, lon: Option<f64>) -> ArchiveRecord {
        ArchiveRecord {
            id: 1,
            file_url: "https://bucket.example/storage/v1/object/public/b/abc123.jpg".into(),
            file_type: FileType::Image,
            description: "shrine gate".into(),
            address: "東京都千代田区".into(),
            latitude: lat,
            longitude: lon,
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 5).unwrap(),
        }
    }

    #[test]
    fn file_type_tags_round_trip_and_unknown_degrades() {
        assert_eq!(FileType::from_tag("image"), FileType::Image);
        assert_eq!(FileType::from_tag("video"), FileType::Video);
        assert_eq!(FileType::from_tag("audio"), FileType::Audio);
        assert_eq!(FileType::from_tag("other"), FileType::Other);
        assert_eq!(FileType::from_tag("document"), FileType::Other);
        assert_eq!(FileType::from_tag(""), FileType::Other);
        assert_eq!(FileType::Video.as_str(), "video");
    }

    #[test]
    fn coordinates_require_the_full_pair() {
        assert_eq!(record(Some(35.69), Some(139.75)).coordinates(), Some((35.69, 139.75)));
        assert_eq!(record(Some(35.69), None).coordinates(), None);
        assert_eq!(record(None, Some(139.75)).coordinates(), None);
        assert_eq!(record(None, None).coordinates(), None);
    }

    #[test]
    fn marker_projection_skips_ungeolocated_records() {
        let marker = record(Some(35.69), Some(139.75)).to_marker().unwrap();
        assert_eq!(marker.latitude, 35.69);
        assert_eq!(marker.longitude, 139.75);
        assert_eq!(marker.file_name, "abc123.jpg");
        assert_eq!(marker.upload_date, "2025-06-01 12:30:05");

        assert!(record(None, None).to_marker().is_none());
        assert!(record(Some(35.69), None).to_marker().is_none());
    }

    #[test]
    fn file_entry_keeps_optional_coordinates() {
        let entry = record(None, None).to_file_entry();
        assert_eq!(entry.file_name, "abc123.jpg");
        assert_eq!(entry.latitude, None);
        assert_eq!(entry.longitude, None);
        assert_eq!(entry.upload_date, "2025-06-01 12:30:05");
    }

    #[test]
    fn url_basename_handles_queries_and_fragments() {
        assert_eq!(url_basename("https://h.example/a/b/photo.jpg"), "photo.jpg");
        assert_eq!(url_basename("https://h.example/a/photo.jpg?download=1"), "photo.jpg");
        assert_eq!(url_basename("https://h.example/a/photo.jpg#frag"), "photo.jpg");
        assert_eq!(url_basename("plainname"), "plainname");
    }
}
