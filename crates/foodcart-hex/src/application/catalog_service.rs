use crate::errors::AppError;
use foodcart_types::domain::catalog::{
    sort_restaurants, AvailabilityMatrix, Category, MenuEntry, NewProduct, Product,
    ProductAvailability, Restaurant,
};
use foodcart_types::ports::CatalogRepository;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

pub struct CatalogService<R> {
    repo: R,
}

impl<R: CatalogRepository> CatalogService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub async fn create_restaurant(
        &self,
        name: String,
        address: String,
        contact_phone: String,
    ) -> Result<Restaurant, AppError> {
        let restaurant = Restaurant::new(name, address, contact_phone)?;
        let restaurant = self.repo.create_restaurant(restaurant).await?;
        info!(restaurant_id = %restaurant.id, name = %restaurant.name, "restaurant created");
        Ok(restaurant)
    }

    pub async fn list_restaurants(&self) -> Result<Vec<Restaurant>, AppError> {
        Ok(self.repo.list_restaurants().await?)
    }

    pub async fn create_category(&self, name: String) -> Result<Category, AppError> {
        let category = self.repo.create_category(Category::new(name)?).await?;
        info!(category_id = %category.id, "category created");
        Ok(category)
    }

    pub async fn create_product(&self, input: NewProduct) -> Result<Product, AppError> {
        let category = match input.category_id {
            Some(id) => match self.repo.get_category(id).await? {
                Some(c) => Some(c),
                None => return Err(AppError::BadRequest(format!("no category with id = {}", id))),
            },
            None => None,
        };
        let product = self.repo.create_product(Product::new(input, category)?).await?;
        info!(product_id = %product.id, name = %product.name, "product created");
        Ok(product)
    }

    /// Creates or replaces the availability of one product in one restaurant.
    pub async fn set_menu_entry(&self, entry: MenuEntry) -> Result<MenuEntry, AppError> {
        if self.repo.get_restaurant(entry.restaurant_id).await?.is_none() {
            return Err(AppError::NotFound(format!("restaurant {}", entry.restaurant_id)));
        }
        if self.repo.get_products(&[entry.product_id]).await?.is_empty() {
            return Err(AppError::NotFound(format!("product {}", entry.product_id)));
        }
        let entry = self.repo.set_menu_entry(entry).await?;
        info!(
            restaurant_id = %entry.restaurant_id,
            product_id = %entry.product_id,
            availability = entry.availability,
            "menu entry set"
        );
        Ok(entry)
    }

    /// Products stocked by at least one restaurant.
    pub async fn available_products(&self) -> Result<Vec<Product>, AppError> {
        Ok(self.repo.list_available_products().await?)
    }

    /// Every product against every restaurant. Missing menu entries read as
    /// unavailable.
    pub async fn availability_matrix(&self) -> Result<AvailabilityMatrix, AppError> {
        let mut restaurants = self.repo.list_restaurants().await?;
        sort_restaurants(&mut restaurants);
        let products = self.repo.list_products().await?;
        let stocked: HashMap<(Uuid, Uuid), bool> = self
            .repo
            .list_menu_entries()
            .await?
            .into_iter()
            .map(|e| ((e.restaurant_id, e.product_id), e.availability))
            .collect();

        let products = products
            .into_iter()
            .map(|product| {
                let availability = restaurants
                    .iter()
                    .map(|r| stocked.get(&(r.id, product.id)).copied().unwrap_or(false))
                    .collect();
                ProductAvailability {
                    product,
                    availability,
                }
            })
            .collect();
        Ok(AvailabilityMatrix {
            restaurants,
            products,
        })
    }
}
