pub mod catalog_repository;
pub mod geocode_cache;
pub mod geocoder;
pub mod order_repository;

pub use catalog_repository::CatalogRepository;
pub use geocode_cache::GeocodeCache;
pub use geocoder::Geocoder;
pub use order_repository::{OrderRepository, RepoError};

/// Everything the application layer needs from a storage backend.
pub trait Store: OrderRepository + CatalogRepository + GeocodeCache + Clone {}

impl<T> Store for T where T: OrderRepository + CatalogRepository + GeocodeCache + Clone {}
