use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("price must not be negative")]
    NegativePrice,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

impl Category {
    pub fn new(name: String) -> Result<Self, CatalogError> {
        if name.trim().is_empty() {
            return Err(CatalogError::Empty("name"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price_cents: i64,
    pub category: Option<Category>,
    pub description: String,
    pub image_url: String,
    pub special_status: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price_cents: i64,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub special_status: bool,
}

impl Product {
    pub fn new(input: NewProduct, category: Option<Category>) -> Result<Self, CatalogError> {
        if input.name.trim().is_empty() {
            return Err(CatalogError::Empty("name"));
        }
        if input.price_cents < 0 {
            return Err(CatalogError::NegativePrice);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name: input.name,
            price_cents: input.price_cents,
            category,
            description: input.description,
            image_url: input.image_url,
            special_status: input.special_status,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Restaurant {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub contact_phone: String,
}

impl Restaurant {
    pub fn new(name: String, address: String, contact_phone: String) -> Result<Self, CatalogError> {
        if name.trim().is_empty() {
            return Err(CatalogError::Empty("name"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            address,
            contact_phone,
        })
    }
}

/// Whether a restaurant currently sells a product.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MenuEntry {
    pub restaurant_id: Uuid,
    pub product_id: Uuid,
    pub availability: bool,
}

/// Staff-facing view of one product against every restaurant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductAvailability {
    pub product: Product,
    /// Same order as the restaurant list it was built against.
    pub availability: Vec<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityMatrix {
    pub restaurants: Vec<Restaurant>,
    pub products: Vec<ProductAvailability>,
}

/// Restaurants ordered for display: by name, ties broken by id.
pub fn sort_restaurants(restaurants: &mut [Restaurant]) {
    restaurants.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product(name: &str, price_cents: i64) -> NewProduct {
        NewProduct {
            name: name.into(),
            price_cents,
            category_id: None,
            description: String::new(),
            image_url: String::new(),
            special_status: false,
        }
    }

    #[test]
    fn product_validation() {
        assert!(Product::new(new_product("Burger", 350), None).is_ok());
        assert_eq!(
            Product::new(new_product(" ", 350), None),
            Err(CatalogError::Empty("name"))
        );
        assert_eq!(
            Product::new(new_product("Burger", -1), None),
            Err(CatalogError::NegativePrice)
        );
    }

    #[test]
    fn restaurants_sort_by_name() {
        let mut list = vec![
            Restaurant::new("Zeta".into(), "".into(), "".into()).unwrap(),
            Restaurant::new("Alpha".into(), "".into(), "".into()).unwrap(),
        ];
        sort_restaurants(&mut list);
        assert_eq!(list[0].name, "Alpha");
        assert!(Restaurant::new("".into(), "".into(), "".into()).is_err());
    }
}
