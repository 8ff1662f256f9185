#[cfg(not(any(feature = "memory", feature = "sqlite")))]
compile_error!("Enable a repo feature: `memory` or `sqlite`.");

use foodcart_types::domain::catalog::{Category, MenuEntry, Product, Restaurant};
use foodcart_types::domain::geo::{CachePolicy, Coordinate, GeocodeEntry};
use foodcart_types::domain::order::Order;
use foodcart_types::ports::{CatalogRepository, GeocodeCache, OrderRepository, RepoError};
use uuid::Uuid;

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Storage backend selected at startup.
#[derive(Clone)]
pub enum Repo {
    #[cfg(feature = "memory")]
    Memory(memory::InMemoryRepo),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite::SqliteRepo),
}

pub async fn build_repo(url: Option<&str>, policy: CachePolicy) -> anyhow::Result<Repo> {
    Repo::build_repo(url, policy).await
}

impl Repo {
    #[cfg(all(feature = "memory", not(feature = "sqlite")))]
    pub async fn build_repo(_: Option<&str>, policy: CachePolicy) -> anyhow::Result<Self> {
        Ok(Self::Memory(memory::InMemoryRepo::with_cache_policy(policy)))
    }

    #[cfg(all(feature = "sqlite", not(feature = "memory")))]
    pub async fn build_repo(database_url: Option<&str>, policy: CachePolicy) -> anyhow::Result<Self> {
        let url = database_url.unwrap_or("sqlite://foodcart.db");
        let sqlite = sqlite::SqliteRepo::with_cache_policy(url, policy).await?;
        Ok(Self::Sqlite(sqlite))
    }

    // If both features are enabled, a database URL selects SQLite.
    #[cfg(all(feature = "sqlite", feature = "memory"))]
    pub async fn build_repo(database_url: Option<&str>, policy: CachePolicy) -> anyhow::Result<Self> {
        match database_url {
            Some(url) => Ok(Self::Sqlite(
                sqlite::SqliteRepo::with_cache_policy(url, policy).await?,
            )),
            None => Ok(Self::Memory(memory::InMemoryRepo::with_cache_policy(policy))),
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $repo:ident => $call:expr) => {
        match $self {
            #[cfg(feature = "memory")]
            Repo::Memory($repo) => $call,
            #[cfg(feature = "sqlite")]
            Repo::Sqlite($repo) => $call,
        }
    };
}

#[async_trait::async_trait]
impl OrderRepository for Repo {
    async fn get_or_create_by_phone(&self, order: Order) -> Result<(Order, bool), RepoError> {
        dispatch!(self, r => r.get_or_create_by_phone(order).await)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, RepoError> {
        dispatch!(self, r => r.get(id).await)
    }

    async fn list(&self) -> Result<Vec<Order>, RepoError> {
        dispatch!(self, r => r.list().await)
    }

    async fn list_in_process(&self) -> Result<Vec<Order>, RepoError> {
        dispatch!(self, r => r.list_in_process().await)
    }

    async fn save(&self, order: &Order) -> Result<bool, RepoError> {
        dispatch!(self, r => r.save(order).await)
    }
}

#[async_trait::async_trait]
impl CatalogRepository for Repo {
    async fn create_restaurant(&self, restaurant: Restaurant) -> Result<Restaurant, RepoError> {
        dispatch!(self, r => r.create_restaurant(restaurant).await)
    }

    async fn get_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, RepoError> {
        dispatch!(self, r => r.get_restaurant(id).await)
    }

    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, RepoError> {
        dispatch!(self, r => r.list_restaurants().await)
    }

    async fn create_category(&self, category: Category) -> Result<Category, RepoError> {
        dispatch!(self, r => r.create_category(category).await)
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, RepoError> {
        dispatch!(self, r => r.get_category(id).await)
    }

    async fn create_product(&self, product: Product) -> Result<Product, RepoError> {
        dispatch!(self, r => r.create_product(product).await)
    }

    async fn get_products(&self, ids: &[Uuid]) -> Result<Vec<Product>, RepoError> {
        dispatch!(self, r => r.get_products(ids).await)
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepoError> {
        dispatch!(self, r => r.list_products().await)
    }

    async fn list_available_products(&self) -> Result<Vec<Product>, RepoError> {
        dispatch!(self, r => r.list_available_products().await)
    }

    async fn set_menu_entry(&self, entry: MenuEntry) -> Result<MenuEntry, RepoError> {
        dispatch!(self, r => r.set_menu_entry(entry).await)
    }

    async fn list_menu_entries(&self) -> Result<Vec<MenuEntry>, RepoError> {
        dispatch!(self, r => r.list_menu_entries().await)
    }

    async fn restaurants_stocking(&self, product_id: Uuid) -> Result<Vec<Restaurant>, RepoError> {
        dispatch!(self, r => r.restaurants_stocking(product_id).await)
    }
}

#[async_trait::async_trait]
impl GeocodeCache for Repo {
    async fn lookup(&self, address: &str) -> Result<Option<GeocodeEntry>, RepoError> {
        dispatch!(self, r => r.lookup(address).await)
    }

    async fn store(&self, address: &str, coordinate: Coordinate) -> Result<Coordinate, RepoError> {
        dispatch!(self, r => r.store(address, coordinate).await)
    }
}
