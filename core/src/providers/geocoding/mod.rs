mod opencage;

pub use opencage::OpenCageGeocoder;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::LookupError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Coordinates of the best ranked match for `city`
    async fn lookup(&self, city: &str) -> Result<Coordinates, LookupError>;
}
