//! HTTP API for the DrinkWare order lifecycle.
//!
//! Provides REST endpoints for the product catalog, order lines, supplier
//! replenishment and the shopping cart, with structured logging (tracing)
//! and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod input;
pub mod response;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, create_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    use routes::{cart, order_lines, products, supplier_requests, system};

    let metrics_router = Router::new()
        .route("/metrics", get(system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(system::health))
        .route("/products", get(products::list::<S>).post(products::create::<S>))
        .route("/products/{id}", get(products::get::<S>).post(products::act::<S>))
        .route(
            "/orderlines",
            get(order_lines::list::<S>).post(order_lines::create::<S>),
        )
        .route("/orderlines/adopt", post(order_lines::adopt::<S>))
        .route(
            "/orderlines/{id}",
            get(order_lines::get::<S>)
                .put(order_lines::update::<S>)
                .delete(order_lines::delete::<S>),
        )
        .route(
            "/supplier-requests",
            get(supplier_requests::list::<S>).post(supplier_requests::create::<S>),
        )
        .route(
            "/supplier-requests/resolve",
            post(supplier_requests::resolve::<S>),
        )
        .route(
            "/supplier-requests/{id}",
            get(supplier_requests::get::<S>)
                .put(supplier_requests::update::<S>)
                .delete(supplier_requests::delete::<S>),
        )
        .route("/cart/items", post(cart::add_item::<S>))
        .route("/cart/items/{id}", delete(cart::remove_item::<S>))
        .route("/cart/checkout", post(cart::checkout::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
}
