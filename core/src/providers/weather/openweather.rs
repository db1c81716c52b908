use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, instrument};

use super::{WeatherProvider, WeatherReport};
use crate::config::{http_client, ApiKey, ConfigError, ServiceConfig};
use crate::providers::{geocoding::Coordinates, LookupError};

/// [OpenWeatherMap](https://openweathermap.org/current) current weather, in metric units
pub struct OpenWeatherClient {
    api_key: ApiKey,
    api_url: String,
    client: reqwest::Client,
    language: String,
}

#[derive(Deserialize)]
struct OpenWeatherResponse {
    name: Option<String>,
    main: Main,
    weather: Vec<Condition>,
}

#[derive(Deserialize)]
struct Main {
    temp: f64,
    humidity: u32,
}

#[derive(Deserialize)]
struct Condition {
    description: String,
}

impl OpenWeatherClient {
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
impl WeatherProvider for OpenWeatherClient {
    #[instrument(skip(self))]
    async fn current(&self, coords: Coordinates) -> Result<WeatherReport, LookupError> {
        let lat = coords.lat.to_string();
        let lon = coords.lon.to_string();
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("appid", self.api_key.expose()),
                ("units", "metric"),
                ("lang", self.language.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                error!(error = %e, "OpenWeatherMap request failed");
                LookupError::from(e)
            })?;

        let status = response.status();
        debug!(%status, "Received OpenWeatherMap response");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, error = %body, "OpenWeatherMap returned error response");
            return Err(LookupError::Status(status.as_u16(), body));
        }

        let body: OpenWeatherResponse = response.json().await.map_err(LookupError::from)?;
        let description = body
            .weather
            .into_iter()
            .next()
            .map(|c| c.description)
            .ok_or_else(|| LookupError::Parse("response has no weather conditions".to_string()))?;

        Ok(WeatherReport {
            city_name: body.name.filter(|n| !n.is_empty()),
            temp_celsius: body.main.temp,
            description,
            humidity: body.main.humidity,
        })
    }
}
