//! Gateway error taxonomy

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    // validation, reported before any stream is opened
    #[error("prompt and model are required")]
    MissingFields,

    #[error("Model {0} not found")]
    UnknownModel(String),

    // daemon unreachable, timed out or answered non-2xx
    #[error("{0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MissingFields | GatewayError::UnknownModel(_) => StatusCode::BAD_REQUEST,
            GatewayError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct JsonError {
    pub error: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(JsonError {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_map_to_bad_request() {
        assert_eq!(
            GatewayError::MissingFields.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::UnknownModel("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_upstream_errors_map_to_service_unavailable() {
        let err: GatewayError = reqwest::Client::new()
            .get("not a url")
            .send()
            .await
            .unwrap_err()
            .into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_unknown_model_message_names_model() {
        let err = GatewayError::UnknownModel("llama3:8b".into());
        assert_eq!(err.to_string(), "Model llama3:8b not found");
    }

    #[tokio::test]
    async fn test_into_response_has_json_error_body() {
        let response = GatewayError::MissingFields.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "prompt and model are required");
    }
}
