//! Forward and reverse geocoding against the GSI address services.
//!
//! `forward` treats every failure (transport, bad status, malformed body,
//! empty result set) as "no match" rather than an error — the ingestion
//! pipeline decides what to do with a missing location. `reverse` is total:
//! it always produces a display string, at worst a synthesized placeholder
//! carrying the given coordinates.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const GSI_SEARCH_URL: &str = "https://msearch.gsi.go.jp/address-search/AddressSearch";
const GSI_REVERSE_URL: &str = "https://mreverse.gsi.go.jp/reverse-geocode/cgi-bin/reversegeocode.cgi";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Address lookup seam used by the ingestion pipeline.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Coordinates for a free-text address, `(latitude, longitude)`.
    async fn forward(&self, address: &str) -> Option<(f64, f64)>;

    /// Display address for coordinates. Never fails; falls back to a
    /// `"lat: {lat}, lon: {lon}"` placeholder.
    async fn reverse(&self, latitude: f64, longitude: f64) -> String;
}

/// One element of the address-search response array.
#[derive(Debug, Deserialize)]
pub struct AddressSearchFeature {
    pub geometry: FeatureGeometry,
}

/// GeoJSON-style geometry. The coordinate order on the wire is
/// [longitude, latitude] and must be swapped before use.
#[derive(Debug, Deserialize)]
pub struct FeatureGeometry {
    pub coordinates: Vec<f64>,
}

/// Reverse-geocode response body.
#[derive(Debug, Deserialize)]
pub struct ReverseGeocodeResponse {
    #[serde(default)]
    pub results: Vec<ReverseGeocodeResult>,
}

#[derive(Debug, Deserialize)]
pub struct ReverseGeocodeResult {
    pub municipality: Option<String>,
    #[serde(rename = "localAddress")]
    pub local_address: Option<String>,
}

/// Geocoder backed by the GSI address-search and reverse-geocode endpoints.
#[derive(Clone)]
pub struct GsiGeocoder {
    client: reqwest::Client,
    search_url: String,
    reverse_url: String,
}

impl GsiGeocoder {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("geoarchive/0.1 (media-archive-service)")
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            search_url: GSI_SEARCH_URL.to_string(),
            reverse_url: GSI_REVERSE_URL.to_string(),
        }
    }

    /// Override both endpoint URLs. Used by tests to point at an
    /// unreachable address.
    #[cfg(test)]
    pub fn with_endpoints(search_url: impl Into<String>, reverse_url: impl Into<String>) -> Self {
        Self {
            search_url: search_url.into(),
            reverse_url: reverse_url.into(),
            ..Self::new()
        }
    }
}

impl Default for GsiGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for GsiGeocoder {
    async fn forward(&self, address: &str) -> Option<(f64, f64)> {
        let url = format!("{}?q={}", self.search_url, urlencoding::encode(address));
        tracing::debug!("forward geocoding: {} -> {}", address, url);

        let response = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(err) => {
                tracing::warn!("address search request failed: {}", err);
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::warn!("address search returned status: {}", response.status());
            return None;
        }

        let features: Vec<AddressSearchFeature> = match response.json().await {
            Ok(features) => features,
            Err(err) => {
                tracing::warn!("failed to parse address search response: {}", err);
                return None;
            }
        };

        extract_coordinates(&features)
    }

    async fn reverse(&self, latitude: f64, longitude: f64) -> String {
        let url = format!(
            "{}?lat={}&lon={}&zoom=18&format=json",
            self.reverse_url, latitude, longitude
        );
        tracing::debug!("reverse geocoding: ({}, {}) -> {}", latitude, longitude, url);

        let body = match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => resp.json::<ReverseGeocodeResponse>().await,
            Ok(resp) => {
                tracing::warn!("reverse geocode returned status: {}", resp.status());
                return placeholder_address(latitude, longitude);
            }
            Err(err) => {
                tracing::warn!("reverse geocode request failed: {}", err);
                return placeholder_address(latitude, longitude);
            }
        };

        match body {
            Ok(parsed) => join_address(&parsed)
                .unwrap_or_else(|| placeholder_address(latitude, longitude)),
            Err(err) => {
                tracing::warn!("failed to parse reverse geocode response: {}", err);
                placeholder_address(latitude, longitude)
            }
        }
    }
}

/// Pick the first feature and swap its [lon, lat] pair into (lat, lon).
/// Anything malformed or non-finite yields no coordinates.
fn extract_coordinates(features: &[AddressSearchFeature]) -> Option<(f64, f64)> {
    let feature = features.first()?;
    match feature.geometry.coordinates[..] {
        [lon, lat] if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
        _ => None,
    }
}

/// Join municipality and local address with a space; `None` when the
/// response carries neither.
fn join_address(response: &ReverseGeocodeResponse) -> Option<String> {
    let result = response.results.first()?;
    let parts: Vec<&str> = [result.municipality.as_deref(), result.local_address.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn placeholder_address(latitude: f64, longitude: f64) -> String {
    format!("lat: {}, lon: {}", latitude, longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_response_swaps_coordinate_order() {
        // The wire order is [longitude, latitude].
        let features: Vec<AddressSearchFeature> =
            serde_json::from_str(r#"[{"geometry":{"coordinates":[139.767, 35.681]}}]"#).unwrap();
        assert_eq!(extract_coordinates(&features), Some((35.681, 139.767)));
    }

    #[test]
    fn forward_empty_or_malformed_yields_none() {
        let empty: Vec<AddressSearchFeature> = serde_json::from_str("[]").unwrap();
        assert_eq!(extract_coordinates(&empty), None);

        let short: Vec<AddressSearchFeature> =
            serde_json::from_str(r#"[{"geometry":{"coordinates":[139.767]}}]"#).unwrap();
        assert_eq!(extract_coordinates(&short), None);
    }

    #[test]
    fn reverse_response_joins_municipality_and_local_address() {
        let parsed: ReverseGeocodeResponse = serde_json::from_str(
            r#"{"results":[{"municipality":"千代田区","localAddress":"丸の内1丁目"}]}"#,
        )
        .unwrap();
        assert_eq!(join_address(&parsed), Some("千代田区 丸の内1丁目".to_string()));
    }

    #[test]
    fn reverse_response_with_partial_fields() {
        let parsed: ReverseGeocodeResponse =
            serde_json::from_str(r#"{"results":[{"municipality":"千代田区"}]}"#).unwrap();
        assert_eq!(join_address(&parsed), Some("千代田区".to_string()));

        let empty: ReverseGeocodeResponse =
            serde_json::from_str(r#"{"results":[{}]}"#).unwrap();
        assert_eq!(join_address(&empty), None);

        let no_results: ReverseGeocodeResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(join_address(&no_results), None);
    }

    #[tokio::test]
    async fn reverse_is_total_when_the_service_is_unreachable() {
        let geocoder = GsiGeocoder::with_endpoints("http://127.0.0.1:1", "http://127.0.0.1:1");
        let address = geocoder.reverse(35.5, 139.25).await;
        assert_eq!(address, "lat: 35.5, lon: 139.25");
    }

    #[tokio::test]
    async fn forward_is_not_found_when_the_service_is_unreachable() {
        let geocoder = GsiGeocoder::with_endpoints("http://127.0.0.1:1", "http://127.0.0.1:1");
        assert_eq!(geocoder.forward("東京都千代田区").await, None);
    }
}
