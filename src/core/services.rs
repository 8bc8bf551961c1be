//! Implementations for the service the app needs.
//!

use crate::core::traits::ModelCatalog;
use crate::infrastructure::config::GatewayConfig;
use crate::infrastructure::traits::InferenceDaemon;
use async_trait::async_trait;
use di::{Ref, inject, injectable};
use log::{debug, error};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct Snapshot {
    models: Vec<String>,
    fetched_at: Instant,
}

/// Allow-list of installed models, fetched from the daemon and kept for `refresh_interval`.
pub struct CachedModelCatalog {
    daemon: Ref<dyn InferenceDaemon>,
    refresh_interval: Duration,
    snapshot: RwLock<Option<Snapshot>>,
}

#[injectable(ModelCatalog)]
impl CachedModelCatalog {
    #[inject]
    pub fn create(daemon: Ref<dyn InferenceDaemon>, config: Ref<GatewayConfig>) -> Self {
        CachedModelCatalog::new(daemon, config.model_refresh_interval)
    }
}

impl CachedModelCatalog {
    pub fn new(daemon: Ref<dyn InferenceDaemon>, refresh_interval: Duration) -> Self {
        CachedModelCatalog {
            daemon,
            refresh_interval,
            snapshot: RwLock::new(None),
        }
    }
}

#[async_trait]
impl ModelCatalog for CachedModelCatalog {
    async fn refresh(&self) -> Vec<String> {
        let models = match self.daemon.list_models().await {
            Ok(models) => {
                debug!("Available models: {models:?}");
                models
            }
            Err(e) => {
                error!("Failed to list models: {e}");
                Vec::new()
            }
        };

        *self.snapshot.write().await = Some(Snapshot {
            models: models.clone(),
            fetched_at: Instant::now(),
        });
        models
    }

    async fn snapshot(&self) -> Vec<String> {
        if let Some(snapshot) = self.snapshot.read().await.as_ref() {
            if !snapshot.models.is_empty() && snapshot.fetched_at.elapsed() < self.refresh_interval
            {
                return snapshot.models.clone();
            }
        }
        self.refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::infrastructure::entities::GenerateRequest;
    use crate::infrastructure::traits::ByteStream;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Daemon whose listing can be swapped between calls.
    struct FakeDaemon {
        models: Mutex<Option<Vec<String>>>,
        calls: AtomicUsize,
    }

    impl FakeDaemon {
        fn with(models: &[&str]) -> Ref<FakeDaemon> {
            let daemon = FakeDaemon::unavailable();
            daemon.set(models);
            daemon
        }

        fn unavailable() -> Ref<FakeDaemon> {
            Ref::new(FakeDaemon {
                models: Mutex::new(None),
                calls: AtomicUsize::new(0),
            })
        }

        fn set(&self, models: &[&str]) {
            *self.models.lock().unwrap() = Some(models.iter().map(|s| s.to_string()).collect());
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InferenceDaemon for FakeDaemon {
        async fn list_models(&self) -> Result<Vec<String>, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let models = self.models.lock().unwrap().clone();
            match models {
                Some(models) => Ok(models),
                None => Err(unreachable_error().await),
            }
        }

        async fn version(&self) -> Result<String, GatewayError> {
            Ok("0.0.0".to_string())
        }

        async fn generate(&self, _request: GenerateRequest) -> Result<ByteStream, GatewayError> {
            Err(unreachable_error().await)
        }
    }

    // an unparseable URL fails inside reqwest without touching the network
    async fn unreachable_error() -> GatewayError {
        reqwest::Client::new()
            .get("not a url")
            .send()
            .await
            .unwrap_err()
            .into()
    }

    fn catalog(daemon: &Ref<FakeDaemon>, interval: Duration) -> CachedModelCatalog {
        let daemon: Ref<dyn InferenceDaemon> = daemon.clone();
        CachedModelCatalog::new(daemon, interval)
    }

    #[tokio::test]
    async fn test_refresh_returns_daemon_order() {
        let daemon = FakeDaemon::with(&["tinyllama:latest", "llama3:8b"]);
        let catalog = catalog(&daemon, Duration::from_secs(60));

        assert_eq!(catalog.refresh().await, vec!["tinyllama:latest", "llama3:8b"]);
    }

    #[tokio::test]
    async fn test_refresh_failure_yields_empty_list() {
        let daemon = FakeDaemon::unavailable();
        let catalog = catalog(&daemon, Duration::from_secs(60));

        assert!(catalog.refresh().await.is_empty());
        assert!(!catalog.contains("tinyllama:latest").await);
    }

    #[tokio::test]
    async fn test_snapshot_is_cached_within_interval() {
        let daemon = FakeDaemon::with(&["a"]);
        let catalog = catalog(&daemon, Duration::from_secs(60));

        assert!(catalog.contains("a").await);
        daemon.set(&["b"]);
        assert!(catalog.contains("a").await);
        assert!(!catalog.contains("b").await);
        assert_eq!(daemon.calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_refreshed() {
        let daemon = FakeDaemon::with(&["a"]);
        let catalog = catalog(&daemon, Duration::ZERO);

        assert!(catalog.contains("a").await);
        daemon.set(&["b"]);
        assert!(catalog.contains("b").await);
        assert_eq!(daemon.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_snapshot_is_retried() {
        let daemon = FakeDaemon::unavailable();
        let catalog = catalog(&daemon, Duration::from_secs(60));

        assert!(catalog.snapshot().await.is_empty());
        daemon.set(&["a"]);
        assert_eq!(catalog.snapshot().await, vec!["a"]);
    }

    #[tokio::test]
    async fn test_explicit_refresh_replaces_snapshot() {
        let daemon = FakeDaemon::with(&["a"]);
        let catalog = catalog(&daemon, Duration::from_secs(60));

        catalog.snapshot().await;
        daemon.set(&["b"]);
        catalog.refresh().await;
        assert_eq!(catalog.snapshot().await, vec!["b"]);
    }
}
