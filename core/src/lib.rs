//! # geoweather - Core API Documentation
//!
//! geoweather answers weather questions with a generative model that calls local
//! functions: Gemini asks for a city's coordinates, then for the weather at those
//! coordinates, and finally turns both results into a natural-language answer.
//!
//! ## Components
//!
//! - **Tool chain**: the two stage request → dispatch → resubmit loop
//! - **Tools**: function declarations, argument validation and a name → handler dispatch table
//! - **Providers**: Gemini for completions, OpenCage for geocoding, OpenWeatherMap for weather
//! - **Config**: credentials and endpoints, resolved once and passed to every client
//!
//! ## Example
//!
//! ```rust,no_run
//! use geoweather::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     // needs GEMINI_API_KEY, OPENCAGE_API_KEY and OPENWEATHER_API_KEY
//!     let config = Config::from_env()?;
//!     let outcome = ask(&config, "현재 서울의 날씨를 알려줄래?").await?;
//!     println!("{}", outcome.answer);
//!     Ok(())
//! }
//! ```
//!
//! ## Bring your own collaborators
//!
//! Anything implementing [`completion::CompletionModel`], [`providers::geocoding::Geocoder`]
//! or [`providers::weather::WeatherProvider`] can be plugged into a [`chain::ToolChain`].
//!
//! ```rust,no_run
//! use geoweather::prelude::*;
//! use geoweather::providers::{completions::Gemini, geocoding::OpenCageGeocoder, weather::OpenWeatherClient};
//!
//! # async fn run() -> Result<(), Error> {
//! let config = Config::from_env()?;
//! let tools = lookup_tools(
//!     OpenCageGeocoder::new(&config.geocoding)?,
//!     OpenWeatherClient::new(&config.weather)?,
//! )?;
//! let chain = ToolChain::new(Gemini::new(&config.model)?, tools, weather_stages())?;
//! let outcome = chain.run("런던 날씨 어때?").await?;
//! println!("{:?}: {}", outcome.stop_reason, outcome.answer);
//! # Ok(())
//! # }
//! ```

/// The orchestration loop
///
/// Contains:
/// - `ToolChain`, driving prompt → function call → tool result → resubmission
/// - Stage definitions and run outcomes
/// - The weather chain wired to the builtin providers
pub mod chain;

/// Model messages, transcripts and the `CompletionModel` trait
pub mod completion;

/// Credentials and endpoint configuration
pub mod config;

/// Error types for all library operations
pub mod error;

/// Convenience prelude exports
pub mod prelude;

/// Builtin completion, geocoding and weather providers
pub mod providers;

/// Function calling and tool execution support
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;
