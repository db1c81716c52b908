use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use super::{Tool, ToolArg, ToolError, ToolOutput};
use crate::providers::{geocoding::Geocoder, LookupError};

pub const GEOCODE_TOOL_NAME: &str = "get_lat_lon_from_city";

/// Resolves a city name to `{"lat", "lon"}`. Lookup failures come back as error results.
pub struct GeocodeTool<G> {
    geocoder: G,
    args: Vec<ToolArg>,
}

impl<G: Geocoder> GeocodeTool<G> {
    pub fn new(geocoder: G) -> Self {
        Self {
            geocoder,
            args: vec![ToolArg::new::<String>(
                "city",
                "Name of the city to look up, e.g. 'Seoul', 'London', 'Paris'.",
            )],
        }
    }
}

#[derive(Deserialize)]
struct Params {
    city: String,
}

#[async_trait]
impl<G: Geocoder + 'static> Tool for GeocodeTool<G> {
    fn name(&self) -> &str {
        GEOCODE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Looks up the latitude (lat) and longitude (lon) of a city by its name using the OpenCage API."
    }

    fn args(&self) -> &[ToolArg] {
        &self.args
    }

    async fn call(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let params: Params = serde_json::from_value(Value::Object(args))?;
        match self.geocoder.lookup(&params.city).await {
            Ok(coords) => ToolOutput::success(&coords),
            Err(LookupError::NotFound(city)) => {
                warn!(%city, "No coordinates found");
                Ok(ToolOutput::failure(format!(
                    "could not find coordinates for city '{city}'"
                )))
            }
            Err(e) => {
                warn!(error = %e, "Geocoding failed");
                Ok(ToolOutput::failure(format!("OpenCage API call failed: {e}")))
            }
        }
    }
}
