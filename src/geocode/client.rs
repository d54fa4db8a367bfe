//! Address lookup against the address-search API

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::config::Config;

/// A resolved coordinate pair.
///
/// The upstream payload carries `[lng, lat]`; `lookup` swaps the pair so
/// callers always receive latitude first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// One hit from the address-search API
#[derive(Debug, Deserialize)]
pub struct AddressHit {
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(default)]
    coordinates: Vec<f64>,
}

/// Geocoding errors
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("Address not found")]
    NotFound,

    #[error("No response from the geocoding API")]
    Unreachable,

    #[error("Geocoding request failed: {0}")]
    Unexpected(String),
}

/// Client for server-side address resolution
#[derive(Clone)]
pub struct GeocoderClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl GeocoderClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.geocoder_base_url.clone(),
            timeout: config.geocoder_timeout,
        }
    }

    fn search_url(&self) -> String {
        format!("{}/address-search/AddressSearch", self.base_url)
    }

    /// Resolve an address to coordinates.
    ///
    /// Issues a single request with a bounded timeout; failures are never
    /// retried.
    pub async fn lookup(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        info!("geocoder request start: q={}", address);

        let response = self
            .client
            .get(self.search_url())
            .query(&[("q", address)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!("geocoder returned status {}", status);
            return Err(GeocodeError::Unreachable);
        }

        let hits: Vec<AddressHit> = response.json().await.map_err(|e| {
            error!("geocoder response parse failed: {}", e);
            GeocodeError::Unexpected(e.to_string())
        })?;

        info!("geocoder request done: {} hits", hits.len());
        extract_coordinates(&hits)
    }
}

/// Classify a transport-level failure: connection and timeout errors mean
/// the upstream could not be reached, anything else is unexpected.
fn classify_send_error(err: reqwest::Error) -> GeocodeError {
    if err.is_timeout() || err.is_connect() {
        error!("geocoder unreachable: {}", err);
        GeocodeError::Unreachable
    } else {
        error!("geocoder request error: {}", err);
        GeocodeError::Unexpected(err.to_string())
    }
}

/// Pull the first hit's coordinate pair out of the payload.
///
/// The upstream order is (lng, lat); a payload with no hits, no geometry or
/// a short coordinate array means the address did not resolve.
fn extract_coordinates(hits: &[AddressHit]) -> Result<Coordinates, GeocodeError> {
    let geometry = hits
        .first()
        .and_then(|hit| hit.geometry.as_ref())
        .ok_or(GeocodeError::NotFound)?;

    match geometry.coordinates[..] {
        [lng, lat, ..] => Ok(Coordinates { lat, lng }),
        _ => Err(GeocodeError::NotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(payload: &str) -> Vec<AddressHit> {
        serde_json::from_str(payload).expect("payload should deserialize")
    }

    #[test]
    fn first_hit_coordinates_are_swapped_to_lat_lng() {
        let hits = parse(r#"[{"geometry": {"type": "Point", "coordinates": [139.7, 35.6]}}]"#);

        let coords = extract_coordinates(&hits).expect("coordinates");

        assert_eq!(coords.lat, 35.6);
        assert_eq!(coords.lng, 139.7);
    }

    #[test]
    fn later_hits_are_ignored() {
        let hits = parse(
            r#"[
                {"geometry": {"coordinates": [25.0, 30.0]}},
                {"geometry": {"coordinates": [1.0, 2.0]}}
            ]"#,
        );

        let coords = extract_coordinates(&hits).expect("coordinates");

        assert_eq!(coords.lat, 30.0);
        assert_eq!(coords.lng, 25.0);
    }

    #[test]
    fn empty_result_list_is_not_found() {
        let hits = parse("[]");

        assert!(matches!(
            extract_coordinates(&hits),
            Err(GeocodeError::NotFound)
        ));
    }

    #[test]
    fn missing_geometry_is_not_found() {
        let hits = parse(r#"[{"properties": {"title": "東京都"}}]"#);

        assert!(matches!(
            extract_coordinates(&hits),
            Err(GeocodeError::NotFound)
        ));
    }

    #[test]
    fn short_coordinate_array_is_not_found() {
        let hits = parse(r#"[{"geometry": {"coordinates": [139.7]}}]"#);

        assert!(matches!(
            extract_coordinates(&hits),
            Err(GeocodeError::NotFound)
        ));
    }
}
