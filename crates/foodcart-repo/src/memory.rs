use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use foodcart_types::domain::catalog::{sort_restaurants, Category, MenuEntry, Product, Restaurant};
use foodcart_types::domain::geo::{CachePolicy, Coordinate, GeocodeEntry};
use foodcart_types::domain::order::Order;
use foodcart_types::domain::phone::PhoneNumber;
use foodcart_types::ports::{CatalogRepository, GeocodeCache, OrderRepository, RepoError};
use moka::future::Cache;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct InMemoryRepo {
    pub orders: Arc<DashMap<Uuid, Order>>,
    phones: Arc<DashMap<PhoneNumber, Uuid>>,
    restaurants: Arc<DashMap<Uuid, Restaurant>>,
    categories: Arc<DashMap<Uuid, Category>>,
    products: Arc<DashMap<Uuid, Product>>,
    menu: Arc<DashMap<(Uuid, Uuid), bool>>,
    geocodes: Cache<String, GeocodeEntry>,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self::with_cache_policy(CachePolicy::default())
    }

    /// Geocode entries live for `policy.ttl`; a TTL above
    /// [`CachePolicy::MAX_TTL`] never expires. `max_entries` is a capacity
    /// bound enforced by moka's frequency-based eviction, so the entries
    /// dropped are not necessarily the oldest, and the bound is reached
    /// after moka's pending maintenance runs.
    pub fn with_cache_policy(policy: CachePolicy) -> Self {
        let mut builder = Cache::builder();
        if let Some(max) = policy.max_entries {
            builder = builder.max_capacity(max);
        }
        if let Some(ttl) = policy.ttl.filter(|ttl| *ttl <= CachePolicy::MAX_TTL) {
            builder = builder.time_to_live(ttl);
        }
        Self {
            orders: Arc::new(DashMap::new()),
            phones: Arc::new(DashMap::new()),
            restaurants: Arc::new(DashMap::new()),
            categories: Arc::new(DashMap::new()),
            products: Arc::new(DashMap::new()),
            menu: Arc::new(DashMap::new()),
            geocodes: builder.build(),
        }
    }
}

impl InMemoryRepo {
    /// Cached geocodes after pending expiry and eviction work has run.
    pub async fn geocode_entry_count(&self) -> u64 {
        self.geocodes.run_pending_tasks().await;
        self.geocodes.entry_count()
    }
}

impl Default for InMemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_by_name(mut products: Vec<Product>) -> Vec<Product> {
    products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    products
}

#[async_trait]
impl OrderRepository for InMemoryRepo {
    async fn get_or_create_by_phone(&self, order: Order) -> Result<(Order, bool), RepoError> {
        match self.phones.entry(order.phonenumber.clone()) {
            Entry::Occupied(e) => {
                let id = *e.get();
                let existing = self
                    .orders
                    .get(&id)
                    .map(|r| r.clone())
                    .ok_or_else(|| RepoError::DbError(format!("dangling phone index for {id}")))?;
                Ok((existing, false))
            }
            Entry::Vacant(e) => {
                self.orders.insert(order.id, order.clone());
                e.insert(order.id);
                Ok((order, true))
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, RepoError> {
        Ok(self.orders.get(&id).map(|r| r.clone()))
    }

    async fn list(&self) -> Result<Vec<Order>, RepoError> {
        let mut list: Vec<Order> = self.orders.iter().map(|kv| kv.value().clone()).collect();
        list.sort_by_key(|o| o.registered_at);
        Ok(list)
    }

    async fn list_in_process(&self) -> Result<Vec<Order>, RepoError> {
        let mut list = self.list().await?;
        list.retain(|o| o.status.is_in_process());
        Ok(list)
    }

    async fn save(&self, order: &Order) -> Result<bool, RepoError> {
        if let Some(mut v) = self.orders.get_mut(&order.id) {
            v.status = order.status;
            v.restaurant_id = order.restaurant_id;
            v.called_at = order.called_at;
            v.delivered_at = order.delivered_at;
            v.updated_at = order.updated_at;
            return Ok(true);
        }
        Ok(false)
    }
}

#[async_trait]
impl CatalogRepository for InMemoryRepo {
    async fn create_restaurant(&self, restaurant: Restaurant) -> Result<Restaurant, RepoError> {
        self.restaurants.insert(restaurant.id, restaurant.clone());
        Ok(restaurant)
    }

    async fn get_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, RepoError> {
        Ok(self.restaurants.get(&id).map(|r| r.clone()))
    }

    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, RepoError> {
        let mut list: Vec<Restaurant> = self.restaurants.iter().map(|kv| kv.value().clone()).collect();
        sort_restaurants(&mut list);
        Ok(list)
    }

    async fn create_category(&self, category: Category) -> Result<Category, RepoError> {
        self.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, RepoError> {
        Ok(self.categories.get(&id).map(|r| r.clone()))
    }

    async fn create_product(&self, product: Product) -> Result<Product, RepoError> {
        self.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_products(&self, ids: &[Uuid]) -> Result<Vec<Product>, RepoError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.products.get(id).map(|r| r.clone()))
            .collect())
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepoError> {
        Ok(sorted_by_name(
            self.products.iter().map(|kv| kv.value().clone()).collect(),
        ))
    }

    async fn list_available_products(&self) -> Result<Vec<Product>, RepoError> {
        let available = self
            .products
            .iter()
            .filter(|kv| {
                self.menu
                    .iter()
                    .any(|m| m.key().1 == *kv.key() && *m.value())
            })
            .map(|kv| kv.value().clone())
            .collect();
        Ok(sorted_by_name(available))
    }

    async fn set_menu_entry(&self, entry: MenuEntry) -> Result<MenuEntry, RepoError> {
        self.menu
            .insert((entry.restaurant_id, entry.product_id), entry.availability);
        Ok(entry)
    }

    async fn list_menu_entries(&self) -> Result<Vec<MenuEntry>, RepoError> {
        Ok(self
            .menu
            .iter()
            .map(|kv| MenuEntry {
                restaurant_id: kv.key().0,
                product_id: kv.key().1,
                availability: *kv.value(),
            })
            .collect())
    }

    async fn restaurants_stocking(&self, product_id: Uuid) -> Result<Vec<Restaurant>, RepoError> {
        let mut list: Vec<Restaurant> = self
            .menu
            .iter()
            .filter(|kv| kv.key().1 == product_id && *kv.value())
            .filter_map(|kv| self.restaurants.get(&kv.key().0).map(|r| r.clone()))
            .collect();
        sort_restaurants(&mut list);
        Ok(list)
    }
}

#[async_trait]
impl GeocodeCache for InMemoryRepo {
    async fn lookup(&self, address: &str) -> Result<Option<GeocodeEntry>, RepoError> {
        Ok(self.geocodes.get(address).await)
    }

    async fn store(&self, address: &str, coordinate: Coordinate) -> Result<Coordinate, RepoError> {
        let entry = self
            .geocodes
            .entry(address.to_owned())
            .or_insert(GeocodeEntry::new(address, coordinate))
            .await;
        Ok(entry.into_value().coordinate)
    }
}
