//! Chat page rendering

use crate::core::traits::ModelCatalog;
use crate::error::GatewayError;
use crate::infrastructure::config::GatewayConfig;
use axum::response::{Html, IntoResponse, Response};
use di_axum::Inject;
use log::error;
use minijinja::{Environment, context};

pub mod chat;
pub mod system;

const INDEX_TEMPLATE: &str = include_str!("../../templates/index.html");

/// GET `/`: the chat page, with the installed models in the model picker.
pub async fn index(
    Inject(catalog): Inject<dyn ModelCatalog>,
    Inject(config): Inject<GatewayConfig>,
) -> Response {
    let models = catalog.refresh().await;

    match render_index(&models, &config.default_model) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Failed to render index: {e}");
            (e.status_code(), e.to_string()).into_response()
        }
    }
}

/// Preselects `default_model` when it is installed, otherwise the first model.
pub fn render_index(models: &[String], default_model: &str) -> Result<String, GatewayError> {
    let selected = models
        .iter()
        .find(|m| *m == default_model)
        .or_else(|| models.first())
        .cloned()
        .unwrap_or_default();

    let mut env = Environment::new();
    env.add_template("index.html", INDEX_TEMPLATE)?;
    let html = env.get_template("index.html")?.render(context! {
        models => models,
        selected => selected,
    })?;
    Ok(html)
}
