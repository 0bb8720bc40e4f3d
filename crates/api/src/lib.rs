//! HTTP API server with observability for marketplace checkout.
//!
//! Provides REST endpoints for carts, checkout and order fulfillment,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::OrderNumberGenerator;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::OrderAssembler;
use store::{CartStore, OrderStore, ProductCatalog, StockLedger};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// A backend that serves every storage concern of the API.
pub trait MarketplaceStore:
    ProductCatalog + StockLedger + OrderStore + CartStore + Clone + 'static
{
}

impl<T> MarketplaceStore for T where
    T: ProductCatalog + StockLedger + OrderStore + CartStore + Clone + 'static
{
}

/// Shared application state accessible from all handlers.
pub struct AppState<S: MarketplaceStore> {
    pub store: S,
    pub assembler: OrderAssembler<S, S, S, S>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: MarketplaceStore>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/cart",
            get(routes::cart::get::<S>).delete(routes::cart::clear::<S>),
        )
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{product_id}",
            put(routes::cart::update_item::<S>).delete(routes::cart::remove_item::<S>),
        )
        .route(
            "/orders",
            post(routes::orders::place::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/vendor/orders", get(routes::vendor::list::<S>))
        .route(
            "/vendor/orders/{id}/status",
            put(routes::vendor::update_status::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the checkout saga onto a store using the given configuration.
pub fn create_default_state<S: MarketplaceStore>(store: S, config: &Config) -> Arc<AppState<S>> {
    let order_numbers = Arc::new(OrderNumberGenerator::new(
        config.order_number_prefix.clone(),
    ));
    let assembler = OrderAssembler::new(store.clone(), store.clone(), store.clone(), store.clone())
        .with_config(config.saga)
        .with_order_numbers(order_numbers);

    Arc::new(AppState { store, assembler })
}
