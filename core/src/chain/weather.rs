use super::{ChainOutcome, Stage, ToolChain};
use crate::{
    config::Config,
    error::Error,
    providers::{
        completions::Gemini,
        geocoding::{Geocoder, OpenCageGeocoder},
        weather::{OpenWeatherClient, WeatherProvider},
    },
    tools::{GeocodeTool, ToolSet, ToolSetError, WeatherTool, GEOCODE_TOOL_NAME, WEATHER_TOOL_NAME},
};

/// Coordinates first, then the weather at those coordinates
#[must_use]
pub fn weather_stages() -> [Stage; 2] {
    [
        Stage {
            label: "coordinate lookup",
            tool: GEOCODE_TOOL_NAME,
            result_key: "coords",
        },
        Stage {
            label: "weather lookup",
            tool: WEATHER_TOOL_NAME,
            result_key: "weather_data",
        },
    ]
}

pub fn lookup_tools<G, W>(geocoder: G, weather: W) -> Result<ToolSet, ToolSetError>
where
    G: Geocoder + 'static,
    W: WeatherProvider + 'static,
{
    ToolSet::new(vec![
        Box::new(GeocodeTool::new(geocoder)),
        Box::new(WeatherTool::new(weather)),
    ])
}

/// Answers `prompt` with Gemini, OpenCage and OpenWeatherMap.
///
/// The clients live only for this call and are released when it returns, whether
/// the run succeeded or not.
pub async fn ask(config: &Config, prompt: &str) -> Result<ChainOutcome, Error> {
    let model = Gemini::new(&config.model)?;
    let tools = lookup_tools(
        OpenCageGeocoder::new(&config.geocoding)?,
        OpenWeatherClient::new(&config.weather)?,
    )?;
    let chain = ToolChain::new(model, tools, weather_stages())?;
    chain.run(prompt).await
}

/// Like [`ask`], resolving the config first so a missing credential fails before any
/// client is built.
pub async fn ask_with_env<F>(
    overrides: Option<&str>,
    lookup: F,
    prompt: &str,
) -> Result<ChainOutcome, Error>
where
    F: Fn(&str) -> Option<String>,
{
    let config = match overrides {
        Some(json) => Config::with_overrides(json, lookup)?,
        None => Config::from_lookup(lookup)?,
    };
    ask(&config, prompt).await
}
