use async_trait::async_trait;
use uuid::Uuid;

use super::order_repository::RepoError;
use crate::domain::catalog::{Category, MenuEntry, Product, Restaurant};

#[async_trait]
pub trait CatalogRepository: Send + Sync + 'static {
    async fn create_restaurant(&self, restaurant: Restaurant) -> Result<Restaurant, RepoError>;
    async fn get_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, RepoError>;
    /// Ordered by name.
    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, RepoError>;

    async fn create_category(&self, category: Category) -> Result<Category, RepoError>;
    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, RepoError>;

    async fn create_product(&self, product: Product) -> Result<Product, RepoError>;
    async fn get_products(&self, ids: &[Uuid]) -> Result<Vec<Product>, RepoError>;
    async fn list_products(&self) -> Result<Vec<Product>, RepoError>;
    /// Products with at least one available menu entry.
    async fn list_available_products(&self) -> Result<Vec<Product>, RepoError>;

    /// Inserts or overwrites the entry for the (restaurant, product) pair.
    async fn set_menu_entry(&self, entry: MenuEntry) -> Result<MenuEntry, RepoError>;
    async fn list_menu_entries(&self) -> Result<Vec<MenuEntry>, RepoError>;
    /// Restaurants whose entry for `product_id` is available, ordered by name.
    async fn restaurants_stocking(&self, product_id: Uuid) -> Result<Vec<Restaurant>, RepoError>;
}
