/// Completion model providers
pub mod completions;

/// City name to coordinates lookups
pub mod geocoding;

/// Current weather lookups
pub mod weather;

use thiserror::Error;

/// Failure of a geocoding or weather lookup.
///
/// The lookup tools turn these into in-band error results for the model, they never end a run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("HTTP status {0}: {1}")]
    Status(u16, String),
    #[error("unexpected response body: {0}")]
    Parse(String),
    #[error("no match found for '{0}'")]
    NotFound(String),
}

impl From<reqwest::Error> for LookupError {
    fn from(e: reqwest::Error) -> Self {
        // the request url carries the api key as a query parameter
        let e = e.without_url();
        match e.status() {
            Some(status) => Self::Status(status.as_u16(), e.to_string()),
            None if e.is_decode() => Self::Parse(e.to_string()),
            None => Self::Request(e.to_string()),
        }
    }
}
