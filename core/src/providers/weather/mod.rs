mod openweather;

pub use openweather::OpenWeatherClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{geocoding::Coordinates, LookupError};

/// Current conditions at a location, temperatures in Celsius
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city_name: Option<String>,
    pub temp_celsius: f64,
    pub description: String,
    pub humidity: u32,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, coords: Coordinates) -> Result<WeatherReport, LookupError>;
}
