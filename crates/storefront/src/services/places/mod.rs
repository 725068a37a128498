//! Address autocomplete and geocoding.
//!
//! [`PlacesService`] fronts a [`PlacesProvider`] with the two rules every
//! caller relies on: inputs shorter than [`MIN_QUERY_LEN`] never leave the
//! process, and autocomplete results are cached briefly by `(text, country)`
//! so fast typists do not fan out into one request per keystroke.

pub mod geo;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

pub use geo::{haversine_km, providers_within_radius};

const MAPS_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

/// Autocomplete inputs shorter than this return no predictions.
pub const MIN_QUERY_LEN: usize = 3;

/// Country restriction applied when the caller gives none.
pub const DEFAULT_COUNTRY: &str = "us";

/// Errors from the mapping API.
#[derive(Debug, Error)]
pub enum PlacesError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-OK status (`REQUEST_DENIED`, ...).
    #[error("API error: {status} - {message}")]
    Api { status: String, message: String },

    #[error("place not found: {0}")]
    NotFound(String),
}

/// A point on the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Restrictions for an autocomplete lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutocompleteOptions {
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    /// Place types, e.g. `address`.
    pub types: Vec<String>,
}

impl Default for AutocompleteOptions {
    fn default() -> Self {
        Self {
            country: DEFAULT_COUNTRY.to_owned(),
            types: vec!["address".to_owned()],
        }
    }
}

/// Main and secondary text of a prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredFormatting {
    #[serde(alias = "main_text")]
    pub main_text: String,
    #[serde(default, alias = "secondary_text")]
    pub secondary_text: Option<String>,
}

/// One autocomplete suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacePrediction {
    pub description: String,
    #[serde(alias = "place_id")]
    pub place_id: String,
    #[serde(alias = "structured_formatting")]
    pub structured_formatting: StructuredFormatting,
}

/// A component of a resolved address (street number, locality, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressComponent {
    #[serde(alias = "long_name")]
    pub long_name: String,
    #[serde(alias = "short_name")]
    pub short_name: String,
    pub types: Vec<String>,
}

/// A resolved place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceDetails {
    pub formatted_address: String,
    pub location: LatLng,
    pub address_components: Vec<AddressComponent>,
}

/// Mapping API operations.
#[async_trait]
pub trait PlacesProvider: Send + Sync {
    async fn autocomplete(
        &self,
        text: &str,
        options: &AutocompleteOptions,
    ) -> Result<Vec<PlacePrediction>, PlacesError>;

    async fn place_details(&self, place_id: &str) -> Result<PlaceDetails, PlacesError>;

    /// Resolve a free-text address. `None` when nothing matches.
    async fn geocode(&self, address: &str) -> Result<Option<LatLng>, PlacesError>;
}

// =============================================================================
// Google Maps web services
// =============================================================================

/// Client for the Places Autocomplete, Place Details and Geocoding APIs.
#[derive(Clone)]
pub struct GooglePlacesClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

#[derive(Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(flatten)]
    body: T,
}

#[derive(Deserialize)]
struct AutocompleteBody {
    #[serde(default)]
    predictions: Vec<PlacePrediction>,
}

#[derive(Deserialize)]
struct DetailsBody {
    #[serde(default)]
    result: Option<RawPlace>,
}

#[derive(Deserialize)]
struct GeocodeBody {
    #[serde(default)]
    results: Vec<RawPlace>,
}

#[derive(Deserialize)]
struct RawPlace {
    formatted_address: String,
    geometry: RawGeometry,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Deserialize)]
struct RawGeometry {
    location: LatLng,
}

impl From<RawPlace> for PlaceDetails {
    fn from(raw: RawPlace) -> Self {
        Self {
            formatted_address: raw.formatted_address,
            location: raw.geometry.location,
            address_components: raw.address_components,
        }
    }
}

impl<T> Envelope<T> {
    /// Turn a non-OK status into an error. `ZERO_RESULTS` is not an error.
    fn into_body(self) -> Result<T, PlacesError> {
        match self.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(self.body),
            _ => Err(PlacesError::Api {
                message: self.error_message.unwrap_or_default(),
                status: self.status,
            }),
        }
    }
}

impl GooglePlacesClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(api_key: SecretString) -> Result<Self, PlacesError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: MAPS_BASE_URL.to_owned(),
        })
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, PlacesError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .query(params)
            .query(&[("key", self.api_key.expose_secret())])
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PlacesError::Api {
                status: status.as_u16().to_string(),
                message,
            });
        }

        let envelope: Envelope<T> = response.json().await?;
        envelope.into_body()
    }
}

#[async_trait]
impl PlacesProvider for GooglePlacesClient {
    #[instrument(skip(self, options), fields(country = %options.country))]
    async fn autocomplete(
        &self,
        text: &str,
        options: &AutocompleteOptions,
    ) -> Result<Vec<PlacePrediction>, PlacesError> {
        let components = format!("country:{}", options.country);
        let types = options.types.join("|");
        let body: AutocompleteBody = self
            .get(
                "/place/autocomplete/json",
                &[("input", text), ("components", &components), ("types", &types)],
            )
            .await?;
        Ok(body.predictions)
    }

    #[instrument(skip(self))]
    async fn place_details(&self, place_id: &str) -> Result<PlaceDetails, PlacesError> {
        let body: DetailsBody = self
            .get(
                "/place/details/json",
                &[
                    ("place_id", place_id),
                    ("fields", "formatted_address,geometry,address_components"),
                ],
            )
            .await?;
        body.result
            .map(PlaceDetails::from)
            .ok_or_else(|| PlacesError::NotFound(place_id.to_owned()))
    }

    #[instrument(skip(self, address))]
    async fn geocode(&self, address: &str) -> Result<Option<LatLng>, PlacesError> {
        let body: GeocodeBody = self
            .get("/geocode/json", &[("address", address)])
            .await?;
        Ok(body.results.into_iter().next().map(|r| r.geometry.location))
    }
}

// =============================================================================
// PlacesService
// =============================================================================

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct CacheKey {
    text: String,
    country: String,
}

/// Cached, input-gated access to a [`PlacesProvider`].
#[derive(Clone)]
pub struct PlacesService {
    inner: Arc<PlacesServiceInner>,
}

struct PlacesServiceInner {
    provider: Arc<dyn PlacesProvider>,
    cache: Cache<CacheKey, Arc<Vec<PlacePrediction>>>,
}

impl PlacesService {
    #[must_use]
    pub fn new(provider: Arc<dyn PlacesProvider>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(ttl)
            .build();
        Self {
            inner: Arc::new(PlacesServiceInner { provider, cache }),
        }
    }

    /// Predictions for `text`. Inputs under [`MIN_QUERY_LEN`] characters
    /// (after trimming) yield an empty list without a lookup.
    ///
    /// # Errors
    ///
    /// Returns the provider's error; failures are not cached.
    pub async fn autocomplete(
        &self,
        text: &str,
        options: &AutocompleteOptions,
    ) -> Result<Vec<PlacePrediction>, PlacesError> {
        let text = text.trim();
        if text.chars().count() < MIN_QUERY_LEN {
            return Ok(Vec::new());
        }

        let key = CacheKey {
            text: text.to_lowercase(),
            country: options.country.to_lowercase(),
        };
        if let Some(hit) = self.inner.cache.get(&key).await {
            debug!(text, "autocomplete cache hit");
            return Ok(hit.as_ref().clone());
        }

        let predictions = self.inner.provider.autocomplete(text, options).await?;
        self.inner
            .cache
            .insert(key, Arc::new(predictions.clone()))
            .await;
        Ok(predictions)
    }

    /// # Errors
    ///
    /// Returns the provider's error.
    pub async fn place_details(&self, place_id: &str) -> Result<PlaceDetails, PlacesError> {
        self.inner.provider.place_details(place_id).await
    }

    /// # Errors
    ///
    /// Returns the provider's error.
    pub async fn geocode(&self, address: &str) -> Result<Option<LatLng>, PlacesError> {
        let address = address.trim();
        if address.is_empty() {
            return Ok(None);
        }
        self.inner.provider.geocode(address).await
    }
}
