//! Chat gateway relaying a local Ollama daemon to the browser over SSE - Library exports for
//! testing

pub mod api;
pub mod core;
pub mod error;
pub mod infrastructure;

use crate::core::services::CachedModelCatalog;
use crate::infrastructure::config::GatewayConfig;
use crate::infrastructure::ollama::OllamaClient;
use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use di::{Injectable, ServiceCollection, ServiceProvider};
use di_axum::RouterServiceProviderExtensions;
use log::warn;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Service registrations shared by the binary and the integration tests.
pub fn services() -> ServiceCollection {
    let mut services = ServiceCollection::new();
    services
        .add(GatewayConfig::singleton())
        .add(OllamaClient::singleton())
        .add(CachedModelCatalog::singleton());
    services
}

pub fn build_app(provider: ServiceProvider, config: &GatewayConfig) -> Router {
    let app = Router::new()
        .route("/", get(api::index))
        .merge(api::system::router())
        .merge(api::chat::router())
        .nest_service(
            "/static",
            ServiceBuilder::new().service(ServeDir::new(&config.static_dir)),
        )
        .layer(TraceLayer::new_for_http());

    let app = match cors_layer(&config.cors_allowed_origins) {
        Some(cors) => app.layer(cors),
        None => app,
    };

    app.with_provider(provider)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {origin:?}");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_headers(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_origin(origins),
    )
}
