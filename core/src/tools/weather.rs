use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use super::{Tool, ToolArg, ToolError, ToolOutput};
use crate::providers::{geocoding::Coordinates, weather::WeatherProvider};

pub const WEATHER_TOOL_NAME: &str = "get_weather_by_coords";

/// Current weather at `{"lat", "lon"}`. Lookup failures come back as error results.
pub struct WeatherTool<W> {
    provider: W,
    args: Vec<ToolArg>,
}

impl<W: WeatherProvider> WeatherTool<W> {
    pub fn new(provider: W) -> Self {
        Self {
            provider,
            args: vec![
                ToolArg::new::<f64>("lat", "Latitude of the location to get the weather for."),
                ToolArg::new::<f64>("lon", "Longitude of the location to get the weather for."),
            ],
        }
    }
}

#[derive(Deserialize)]
struct Params {
    lat: f64,
    lon: f64,
}

#[async_trait]
impl<W: WeatherProvider + 'static> Tool for WeatherTool<W> {
    fn name(&self) -> &str {
        WEATHER_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Gets the current weather (temperature, humidity, description) at the given latitude and longitude."
    }

    fn args(&self) -> &[ToolArg] {
        &self.args
    }

    async fn call(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let Params { lat, lon } = serde_json::from_value(Value::Object(args))?;
        match self.provider.current(Coordinates { lat, lon }).await {
            Ok(report) => ToolOutput::success(&report),
            Err(e) => {
                warn!(error = %e, "Weather lookup failed");
                Ok(ToolOutput::failure(format!(
                    "OpenWeatherMap API call failed: {e}"
                )))
            }
        }
    }
}
