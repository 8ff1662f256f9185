use std::time::Duration;

use anyhow::Context;
use foodcart_types::domain::catalog::{
    AvailabilityMatrix, Category, MenuEntry, NewProduct, Product, Restaurant,
};
use foodcart_types::domain::geo::Coordinate;
use foodcart_types::domain::order::{NewOrder, Order, OrderStatus};
use foodcart_types::domain::ranking::{OrderBoardEntry, RankedCandidate};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone)]
pub struct FoodcartClientBuilder {
    base: Url,
    headers: HeaderMap,
    timeout: Option<Duration>,
    client: Option<reqwest::Client>,
}

/// Typed client for the customer and manager HTTP API.
#[derive(Clone)]
pub struct FoodcartClient {
    base: Url,
    client: reqwest::Client,
}

impl FoodcartClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Self::builder(base_url)?.build()
    }

    pub fn builder(base_url: &str) -> anyhow::Result<FoodcartClientBuilder> {
        let base = Url::parse(base_url).context("invalid base url")?;
        Ok(FoodcartClientBuilder {
            base,
            headers: HeaderMap::new(),
            timeout: None,
            client: None,
        })
    }

    fn url(&self, path: &str) -> anyhow::Result<Url> {
        self.base.join(path).context("failed to join url")
    }

    async fn read<T: DeserializeOwned>(res: reqwest::Response) -> anyhow::Result<T> {
        tracing::debug!(status = %res.status(), url = %res.url(), "foodcart response");
        let res = res.error_for_status()?;
        Ok(res.json().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let res = self.client.get(self.url(path)?).send().await?;
        Self::read(res).await
    }

    /// Places an order. A repeat submission for a known phone number
    /// returns the existing order with `created == false`.
    pub async fn place_order(&self, req: &NewOrder) -> anyhow::Result<PlaceOrderResponse> {
        let res = self
            .client
            .post(self.url("api/order")?)
            .json(req)
            .send()
            .await?;
        Self::read(res).await
    }

    pub async fn available_products(&self) -> anyhow::Result<Vec<Product>> {
        self.get("api/products").await
    }

    pub async fn get_order(&self, id: Uuid) -> anyhow::Result<Order> {
        self.get(&format!("orders/{id}")).await
    }

    pub async fn order_board(&self) -> anyhow::Result<Vec<OrderBoardEntry>> {
        self.get("manager/orders").await
    }

    pub async fn candidates(&self, id: Uuid) -> anyhow::Result<Vec<RankedCandidate>> {
        self.get(&format!("manager/orders/{id}/candidates")).await
    }

    pub async fn update_status(&self, id: Uuid, status: OrderStatus) -> anyhow::Result<Order> {
        let res = self
            .client
            .patch(self.url(&format!("manager/orders/{id}/status"))?)
            .json(&UpdateStatusRequest { status })
            .send()
            .await?;
        Self::read(res).await
    }

    pub async fn assign_restaurant(&self, id: Uuid, restaurant_id: Uuid) -> anyhow::Result<Order> {
        let res = self
            .client
            .put(self.url(&format!("manager/orders/{id}/restaurant"))?)
            .json(&AssignRestaurantRequest { restaurant_id })
            .send()
            .await?;
        Self::read(res).await
    }

    pub async fn list_restaurants(&self) -> anyhow::Result<Vec<Restaurant>> {
        self.get("manager/restaurants").await
    }

    pub async fn create_restaurant(
        &self,
        req: &CreateRestaurantRequest,
    ) -> anyhow::Result<Restaurant> {
        let res = self
            .client
            .post(self.url("manager/restaurants")?)
            .json(req)
            .send()
            .await?;
        Self::read(res).await
    }

    pub async fn create_category(&self, name: &str) -> anyhow::Result<Category> {
        let res = self
            .client
            .post(self.url("manager/categories")?)
            .json(&CreateCategoryRequest { name: name.into() })
            .send()
            .await?;
        Self::read(res).await
    }

    pub async fn create_product(&self, req: &NewProduct) -> anyhow::Result<Product> {
        let res = self
            .client
            .post(self.url("manager/products")?)
            .json(req)
            .send()
            .await?;
        Self::read(res).await
    }

    pub async fn set_menu_entry(&self, entry: MenuEntry) -> anyhow::Result<MenuEntry> {
        let res = self
            .client
            .put(self.url("manager/menu")?)
            .json(&entry)
            .send()
            .await?;
        Self::read(res).await
    }

    pub async fn availability_matrix(&self) -> anyhow::Result<AvailabilityMatrix> {
        self.get("manager/products").await
    }
}

impl FoodcartClientBuilder {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(
        mut self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let header_name =
            HeaderName::from_bytes(key.as_ref().as_bytes()).context("invalid header name")?;
        let header_value = HeaderValue::from_str(value.as_ref()).context("invalid header value")?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    pub fn with_reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> anyhow::Result<FoodcartClient> {
        if let Some(client) = self.client {
            return Ok(FoodcartClient {
                base: self.base,
                client,
            });
        }

        let mut builder = reqwest::Client::builder();
        if !self.headers.is_empty() {
            builder = builder.default_headers(self.headers);
        }
        if let Some(t) = self.timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build()?;
        Ok(FoodcartClient {
            base: self.base,
            client,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlaceOrderResponse {
    pub id: Uuid,
    pub status: OrderStatus,
    pub created: bool,
    pub total_cents: i64,
    pub coordinate: Option<Coordinate>,
    pub geocode_error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateRestaurantRequest {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub contact_phone: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct CreateCategoryRequest {
    name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct UpdateStatusRequest {
    status: OrderStatus,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct AssignRestaurantRequest {
    restaurant_id: Uuid,
}
