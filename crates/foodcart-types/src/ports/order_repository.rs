use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::order::Order;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("db error: {0}")]
    DbError(String),
}

#[async_trait]
pub trait OrderRepository: Send + Sync + 'static {
    /// Stores `order` unless an order with the same phone number exists.
    /// Returns the stored order and whether it was created by this call.
    async fn get_or_create_by_phone(&self, order: Order) -> Result<(Order, bool), RepoError>;
    async fn get(&self, id: Uuid) -> Result<Option<Order>, RepoError>;
    async fn list(&self) -> Result<Vec<Order>, RepoError>;
    /// Orders not yet `ready`.
    async fn list_in_process(&self) -> Result<Vec<Order>, RepoError>;
    /// Persists status, restaurant and timestamps of an existing order.
    async fn save(&self, order: &Order) -> Result<bool, RepoError>;
}
