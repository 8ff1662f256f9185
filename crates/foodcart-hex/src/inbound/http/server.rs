use axum::{
    routing::{get, patch, post, put},
    serve, Router,
};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::handlers;
use crate::application::Services;
use foodcart_types::ports::{Geocoder, Store};

#[derive(Clone)]
pub struct HttpServerConfig {
    pub port: String,
}

#[derive(Clone)]
pub struct HttpServer<R, G> {
    pub services: Services<R, G>,
    pub config: HttpServerConfig,
}

impl<R: Store, G: Geocoder> HttpServer<R, G> {
    pub async fn new(services: Services<R, G>, config: HttpServerConfig) -> anyhow::Result<Self> {
        Ok(Self { services, config })
    }

    pub fn router(&self) -> Router {
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                let request_id = Uuid::new_v4();
                tracing::info_span!(
                    "http_request",
                    %request_id,
                    method = %request.method(),
                    uri
                )
            })
            .on_request(
                |request: &axum::extract::Request<_>, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        method = %request.method(),
                        uri = %request.uri(),
                        "request"
                    );
                },
            )
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        status = %response.status(),
                        latency_ms = %latency.as_millis(),
                        "response"
                    );
                },
            );

        // The storefront is served from another origin.
        let customer = Router::new()
            .route("/order", post(handlers::place_order::<R, G>))
            .route("/products", get(handlers::available_products::<R, G>))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );

        let manager = Router::new()
            .route("/orders", get(handlers::order_board::<R, G>))
            .route(
                "/orders/{id}/candidates",
                get(handlers::candidates::<R, G>),
            )
            .route(
                "/orders/{id}/status",
                patch(handlers::update_status::<R, G>),
            )
            .route(
                "/orders/{id}/restaurant",
                put(handlers::assign_restaurant::<R, G>),
            )
            .route(
                "/restaurants",
                get(handlers::list_restaurants::<R, G>).post(handlers::create_restaurant::<R, G>),
            )
            .route("/categories", post(handlers::create_category::<R, G>))
            .route(
                "/products",
                get(handlers::availability_matrix::<R, G>).post(handlers::create_product::<R, G>),
            )
            .route("/menu", put(handlers::set_menu_entry::<R, G>));

        Router::new()
            .route("/health", get(handlers::health))
            .route("/orders/{id}", get(handlers::get_order::<R, G>))
            .nest("/api", customer)
            .nest("/manager", manager)
            .layer(trace_layer)
            .with_state(self.services.clone())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let app = self.router();
        let addr: SocketAddr = format!("0.0.0.0:{}", self.config.port).parse()?;
        tracing::info!("starting server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        serve(listener, app.into_make_service()).await?;
        Ok(())
    }
}
