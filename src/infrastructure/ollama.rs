//! HTTP client for the Ollama daemon

use crate::error::GatewayError;
use crate::infrastructure::config::GatewayConfig;
use crate::infrastructure::entities::{GenerateRequest, TagsResponse, VersionResponse};
use crate::infrastructure::traits::{ByteStream, InferenceDaemon};
use async_trait::async_trait;
use di::{Ref, inject, injectable};
use futures_util::{StreamExt, TryStreamExt};
use log::debug;
use std::time::Duration;

const TAGS_TIMEOUT: Duration = Duration::from_secs(10);
const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

#[injectable(InferenceDaemon)]
impl OllamaClient {
    #[inject]
    pub fn create(config: Ref<GatewayConfig>) -> OllamaClient {
        OllamaClient::new(&config)
    }
}

impl OllamaClient {
    pub fn new(config: &GatewayConfig) -> OllamaClient {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()
            .expect("failed to build HTTP client");

        OllamaClient {
            http,
            base_url: config.ollama_host.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl InferenceDaemon for OllamaClient {
    async fn list_models(&self) -> Result<Vec<String>, GatewayError> {
        let tags: TagsResponse = self
            .http
            .get(self.url("/api/tags"))
            .timeout(TAGS_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn version(&self) -> Result<String, GatewayError> {
        let version: VersionResponse = self
            .http
            .get(self.url("/api/version"))
            .timeout(VERSION_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("Ollama version: {version:?}");
        Ok(version.version.unwrap_or_else(|| "unknown".to_owned()))
    }

    async fn generate(&self, request: GenerateRequest) -> Result<ByteStream, GatewayError> {
        let response = self
            .http
            .post(self.url("/api/generate"))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.bytes_stream().map_err(GatewayError::from).boxed())
    }
}
