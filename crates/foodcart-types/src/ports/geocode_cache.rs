use async_trait::async_trait;

use super::order_repository::RepoError;
use crate::domain::geo::{Coordinate, GeocodeEntry};

#[async_trait]
pub trait GeocodeCache: Send + Sync + 'static {
    /// Live (non-expired) entry for `address`.
    async fn lookup(&self, address: &str) -> Result<Option<GeocodeEntry>, RepoError>;

    /// Insert-if-absent. Returns the coordinate that ends up stored, which is
    /// the earlier one when the address was already cached.
    async fn store(&self, address: &str, coordinate: Coordinate) -> Result<Coordinate, RepoError>;
}
