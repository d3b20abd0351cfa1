//! Address geocoding client.
//!
//! Thin wrapper over a Nominatim-compatible search endpoint. Geocoding is
//! best-effort everywhere it is used: callers log a failure and continue
//! with no coordinates rather than blocking an approval on a third party.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::config::GeocodeConfig;

/// Request timeout for the upstream geocoder.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from a geocoding lookup.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoder request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint answered but could not resolve the address.
    #[error("address could not be resolved")]
    NoResult,

    /// The endpoint returned coordinates that do not parse.
    #[error("geocoder returned malformed coordinates: {0}")]
    MalformedResponse(String),
}

/// A resolved address.
#[derive(Debug, Clone, PartialEq)]
pub struct Geocoded {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: String,
}

/// One result entry in the Nominatim search response.
#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
    display_name: String,
}

/// Geocoding client over a Nominatim-compatible endpoint.
#[derive(Clone)]
pub struct Geocoder {
    client: reqwest::Client,
    endpoint: String,
}

impl Geocoder {
    /// Create a geocoder from configuration.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn new(config: &GeocodeConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// Resolve a free-form address to coordinates.
    ///
    /// # Errors
    ///
    /// Returns `GeocodeError::NoResult` when the endpoint has no match,
    /// `GeocodeError::Request` for transport failures, and
    /// `GeocodeError::MalformedResponse` for unparseable coordinates.
    pub async fn lookup(&self, address: &str) -> Result<Geocoded, GeocodeError> {
        let results: Vec<SearchResult> = self
            .client
            .get(&self.endpoint)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let result = results.into_iter().next().ok_or(GeocodeError::NoResult)?;

        let latitude: f64 = result
            .lat
            .parse()
            .map_err(|_| GeocodeError::MalformedResponse(result.lat.clone()))?;
        let longitude: f64 = result
            .lon
            .parse()
            .map_err(|_| GeocodeError::MalformedResponse(result.lon.clone()))?;

        Ok(Geocoded {
            latitude,
            longitude,
            formatted_address: result.display_name,
        })
    }
}
