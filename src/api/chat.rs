//! Chat streaming endpoint

use crate::api::chat::schemas::ChatRequest;
use crate::core::traits::ModelCatalog;
use crate::core::transcoder::{StreamEvent, transcode, upstream_failure};
use crate::error::GatewayError;
use crate::infrastructure::entities::GenerateRequest;
use crate::infrastructure::traits::InferenceDaemon;
use axum::Router;
use axum::body::Bytes;
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use axum::routing::post;
use di::Ref;
use di_axum::Inject;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use log::{debug, error};
use std::convert::Infallible;

pub fn router() -> Router {
    Router::new().route("/stream_chat", post(stream_chat))
}

async fn stream_chat(
    Inject(catalog): Inject<dyn ModelCatalog>,
    Inject(daemon): Inject<dyn InferenceDaemon>,
    body: Bytes,
) -> Response {
    let request = match validate(&body, &*catalog).await {
        Ok(request) => request,
        Err(e) => {
            error!("Invalid request: {e}");
            return e.into_response();
        }
    };

    debug!(
        "Streaming chat with model: {}, prompt: {}",
        request.model, request.prompt
    );

    let events = relay(daemon, request)
        .await
        .map(|event| Ok::<_, Infallible>(frame(&event)));

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Checks the raw body before any stream is opened.
pub async fn validate(
    body: &[u8],
    catalog: &dyn ModelCatalog,
) -> Result<ChatRequest, GatewayError> {
    let request: schemas::StreamChatBody =
        serde_json::from_slice(body).map_err(|_| GatewayError::MissingFields)?;

    let (Some(prompt), Some(model)) = (request.prompt, request.model) else {
        return Err(GatewayError::MissingFields);
    };
    if prompt.trim().is_empty() {
        return Err(GatewayError::MissingFields);
    }
    if !catalog.contains(&model).await {
        return Err(GatewayError::UnknownModel(model));
    }

    Ok(ChatRequest { prompt, model })
}

/// Opens the upstream generation and transcodes it. Connection failures become a single error
/// event followed by the sentinel.
async fn relay(
    daemon: Ref<dyn InferenceDaemon>,
    request: ChatRequest,
) -> BoxStream<'static, StreamEvent> {
    let generate = GenerateRequest::streaming(request.model, request.prompt);

    match daemon.generate(generate).await {
        Ok(upstream) => transcode(upstream).boxed(),
        Err(e) => stream::iter(upstream_failure(e)).boxed(),
    }
}

/// `data: <payload>\n\n`; multi-line payloads become consecutive `data:` lines.
fn frame(event: &StreamEvent) -> Event {
    Event::default().data(event.payload())
}

pub mod schemas {
    use serde::Deserialize;
    use serde_json::Value;

    /// Loose view of the request body; non-string fields count as missing.
    #[derive(Deserialize, Debug)]
    pub struct StreamChatBody {
        #[serde(default, deserialize_with = "string_or_none")]
        pub prompt: Option<String>,
        #[serde(default, deserialize_with = "string_or_none")]
        pub model: Option<String>,
    }

    fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Some(s),
            _ => None,
        })
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ChatRequest {
        pub prompt: String,
        pub model: String,
    }
}
