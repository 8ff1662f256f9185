pub mod assignment;
pub mod catalog_service;
pub mod geocoding;
pub mod order_service;

use std::sync::Arc;

use foodcart_types::ports::{Geocoder, Store};

use assignment::AssignmentService;
use catalog_service::CatalogService;
use geocoding::CoordinateResolver;
use order_service::OrderService;

/// Application services wired over one store and one geocoder.
pub struct Services<R, G> {
    pub orders: Arc<OrderService<R, G>>,
    pub catalog: Arc<CatalogService<R>>,
}

impl<R, G> Clone for Services<R, G> {
    fn clone(&self) -> Self {
        Self {
            orders: self.orders.clone(),
            catalog: self.catalog.clone(),
        }
    }
}

impl<R: Store, G: Geocoder> Services<R, G> {
    pub fn new(repo: R, geocoder: G) -> Self {
        let resolver = Arc::new(CoordinateResolver::new(repo.clone(), geocoder));
        let assignment = AssignmentService::new(repo.clone(), resolver.clone());
        Self {
            orders: Arc::new(OrderService::new(repo.clone(), resolver, assignment)),
            catalog: Arc::new(CatalogService::new(repo)),
        }
    }
}
