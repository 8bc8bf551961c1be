//! DI "Interfaces"

use async_trait::async_trait;

#[async_trait]
pub trait ModelCatalog: Send + Sync {
    /// Fetches the installed models from the daemon and replaces the snapshot.
    ///
    /// Returns an empty list when the daemon cannot be reached.
    async fn refresh(&self) -> Vec<String>;

    /// The current snapshot, refreshed first if it is stale or empty.
    async fn snapshot(&self) -> Vec<String>;

    /// Whether `model` is in the current snapshot.
    async fn contains(&self, model: &str) -> bool {
        self.snapshot().await.iter().any(|m| m == model)
    }
}
