use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::order_service::PlacedOrder;
use crate::application::Services;
use crate::errors::AppError;
use foodcart_types::domain::catalog::{
    AvailabilityMatrix, Category, MenuEntry, NewProduct, Product, Restaurant,
};
use foodcart_types::domain::geo::Coordinate;
use foodcart_types::domain::order::{NewOrder, Order, OrderStatus};
use foodcart_types::domain::ranking::{OrderBoardEntry, RankedCandidate};
use foodcart_types::ports::{Geocoder, Store};

#[derive(Serialize)]
pub struct PlaceOrderResponse {
    id: Uuid,
    status: OrderStatus,
    created: bool,
    total_cents: i64,
    coordinate: Option<Coordinate>,
    geocode_error: Option<String>,
}

impl From<PlacedOrder> for PlaceOrderResponse {
    fn from(p: PlacedOrder) -> Self {
        Self {
            id: p.order.id,
            status: p.order.status,
            created: p.created,
            total_cents: p.order.total_cents(),
            coordinate: p.coordinate,
            geocode_error: p.geocode_error,
        }
    }
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Deserialize)]
pub struct AssignRestaurantRequest {
    pub restaurant_id: Uuid,
}

#[derive(Deserialize)]
pub struct CreateRestaurantRequest {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub contact_phone: String,
}

#[derive(Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|e| AppError::BadRequest(format!("invalid id {raw:?}: {e}")))
}

pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

pub async fn place_order<R: Store, G: Geocoder>(
    State(services): State<Services<R, G>>,
    payload: Result<Json<NewOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<PlaceOrderResponse>), AppError> {
    let Json(payload) = payload?;
    let placed = services.orders.place_order(payload).await?;
    let code = if placed.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((code, Json(placed.into())))
}

pub async fn available_products<R: Store, G: Geocoder>(
    State(services): State<Services<R, G>>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(services.catalog.available_products().await?))
}

pub async fn get_order<R: Store, G: Geocoder>(
    State(services): State<Services<R, G>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let order = services.orders.get_order(parse_id(&id)?).await?;
    Ok(Json(order))
}

pub async fn order_board<R: Store, G: Geocoder>(
    State(services): State<Services<R, G>>,
) -> Result<Json<Vec<OrderBoardEntry>>, AppError> {
    Ok(Json(services.orders.order_board().await?))
}

pub async fn candidates<R: Store, G: Geocoder>(
    State(services): State<Services<R, G>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RankedCandidate>>, AppError> {
    let ranked = services.orders.candidates(parse_id(&id)?).await?;
    Ok(Json(ranked))
}

pub async fn update_status<R: Store, G: Geocoder>(
    State(services): State<Services<R, G>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Order>, AppError> {
    let id = parse_id(&id)?;
    let Json(payload) = payload?;
    let order = services.orders.update_status(id, payload.status).await?;
    Ok(Json(order))
}

pub async fn assign_restaurant<R: Store, G: Geocoder>(
    State(services): State<Services<R, G>>,
    Path(id): Path<String>,
    payload: Result<Json<AssignRestaurantRequest>, JsonRejection>,
) -> Result<Json<Order>, AppError> {
    let id = parse_id(&id)?;
    let Json(payload) = payload?;
    let order = services
        .orders
        .assign_restaurant(id, payload.restaurant_id)
        .await?;
    Ok(Json(order))
}

pub async fn list_restaurants<R: Store, G: Geocoder>(
    State(services): State<Services<R, G>>,
) -> Result<Json<Vec<Restaurant>>, AppError> {
    Ok(Json(services.catalog.list_restaurants().await?))
}

pub async fn create_restaurant<R: Store, G: Geocoder>(
    State(services): State<Services<R, G>>,
    payload: Result<Json<CreateRestaurantRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Restaurant>), AppError> {
    let Json(payload) = payload?;
    let restaurant = services
        .catalog
        .create_restaurant(payload.name, payload.address, payload.contact_phone)
        .await?;
    Ok((StatusCode::CREATED, Json(restaurant)))
}

pub async fn create_category<R: Store, G: Geocoder>(
    State(services): State<Services<R, G>>,
    payload: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let Json(payload) = payload?;
    let category = services.catalog.create_category(payload.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn create_product<R: Store, G: Geocoder>(
    State(services): State<Services<R, G>>,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let Json(payload) = payload?;
    let product = services.catalog.create_product(payload).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn set_menu_entry<R: Store, G: Geocoder>(
    State(services): State<Services<R, G>>,
    payload: Result<Json<MenuEntry>, JsonRejection>,
) -> Result<Json<MenuEntry>, AppError> {
    let Json(payload) = payload?;
    Ok(Json(services.catalog.set_menu_entry(payload).await?))
}

pub async fn availability_matrix<R: Store, G: Geocoder>(
    State(services): State<Services<R, G>>,
) -> Result<Json<AvailabilityMatrix>, AppError> {
    Ok(Json(services.catalog.availability_matrix().await?))
}
