use async_trait::async_trait;

use crate::domain::geo::{Coordinate, GeocodeError};

/// External address lookup.
#[async_trait]
pub trait Geocoder: Send + Sync + 'static {
    /// Every match for `address`, most relevant first. An empty list means
    /// the provider answered but found nothing.
    async fn geocode(&self, address: &str) -> Result<Vec<Coordinate>, GeocodeError>;
}
