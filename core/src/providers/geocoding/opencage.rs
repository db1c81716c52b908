use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, instrument};

use super::{Coordinates, Geocoder};
use crate::config::{http_client, ApiKey, ConfigError, ServiceConfig};
use crate::providers::LookupError;

/// [OpenCage](https://opencagedata.com) forward geocoding, keeping only the top ranked result
pub struct OpenCageGeocoder {
    api_key: ApiKey,
    api_url: String,
    client: reqwest::Client,
    language: String,
}

#[derive(Deserialize)]
struct OpenCageResponse {
    results: Vec<OpenCageResult>,
}

#[derive(Deserialize)]
struct OpenCageResult {
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Geometry {
    lat: f64,
    lng: f64,
}

impl OpenCageGeocoder {
    pub fn new(config: &ServiceConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            client: http_client(config.timeout)?,
            language: config.language.clone(),
        })
    }
}

#[async_trait]
impl Geocoder for OpenCageGeocoder {
    #[instrument(skip(self))]
    async fn lookup(&self, city: &str) -> Result<Coordinates, LookupError> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("q", city),
                ("key", self.api_key.expose()),
                ("limit", "1"),
                ("language", self.language.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                error!(error = %e, "OpenCage request failed");
                LookupError::from(e)
            })?;

        let status = response.status();
        debug!(%status, "Received OpenCage response");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, error = %body, "OpenCage returned error response");
            return Err(LookupError::Status(status.as_u16(), body));
        }

        let body: OpenCageResponse = response.json().await.map_err(LookupError::from)?;
        body.results
            .into_iter()
            .next()
            .map(|r| Coordinates {
                lat: r.geometry.lat,
                lon: r.geometry.lng,
            })
            .ok_or_else(|| LookupError::NotFound(city.to_string()))
    }
}
