//! Infrastructure traits, used for DI on higher levels

use crate::error::GatewayError;
use crate::infrastructure::entities::GenerateRequest;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;

/// Raw upstream body, as read from the daemon.
pub type ByteStream = BoxStream<'static, Result<Bytes, GatewayError>>;

#[async_trait]
pub trait InferenceDaemon: Send + Sync {
    /// Names of the installed models, in the order the daemon reports them.
    async fn list_models(&self) -> Result<Vec<String>, GatewayError>;

    /// Daemon version string, `"unknown"` when the daemon does not report one.
    async fn version(&self) -> Result<String, GatewayError>;

    /// Starts a streaming generation.
    ///
    /// Returns `Err` when the daemon cannot be reached or answers with a non-2xx status; errors
    /// after the stream has started are items of the returned stream.
    async fn generate(&self, request: GenerateRequest) -> Result<ByteStream, GatewayError>;
}
