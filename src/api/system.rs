//! Health and model listing endpoints

use crate::api::system::schemas::{Health, ModelList, Unhealthy};
use crate::core::traits::ModelCatalog;
use crate::infrastructure::traits::InferenceDaemon;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use di_axum::Inject;
use log::error;

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/models", get(list_models))
}

async fn health(Inject(daemon): Inject<dyn InferenceDaemon>) -> Response {
    match daemon.version().await {
        Ok(version) => (
            StatusCode::OK,
            Json(Health {
                status: "healthy",
                ollama: "accessible",
                version,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Health check failed: {e}");
            (
                e.status_code(),
                Json(Unhealthy {
                    status: "unhealthy",
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn list_models(
    Inject(catalog): Inject<dyn ModelCatalog>,
) -> (StatusCode, Json<ModelList>) {
    let models = catalog.refresh().await;
    (StatusCode::OK, Json(ModelList { models }))
}

pub mod schemas {
    use serde::Serialize;

    #[derive(Serialize, Debug)]
    pub struct Health {
        pub status: &'static str,
        pub ollama: &'static str,
        pub version: String,
    }

    #[derive(Serialize, Debug)]
    pub struct Unhealthy {
        pub status: &'static str,
        pub error: String,
    }

    #[derive(Serialize, Debug)]
    pub struct ModelList {
        pub models: Vec<String>,
    }
}
