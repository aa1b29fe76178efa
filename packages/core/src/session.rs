//! One application session.
//!
//! A `Session` gathers everything that used to be process-wide state: the
//! response cache and its pending-request map, the adapter registry, the
//! widget data store, metrics and the polling scheduler. Dropping or
//! shutting down the session stops every poll it started.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::adapters::{extract_api_provider, AdapterRegistry, NormalizedResult, ViewType};
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::error::AppError;
use crate::metrics::AppMetrics;
use crate::pipeline;
use crate::scheduler::PollingScheduler;
use crate::services::api_client::ApiClient;
use crate::services::http::{HttpTransport, ReqwestTransport};
use crate::store::WidgetDataStore;

pub struct Session {
    config: Config,
    metrics: Arc<AppMetrics>,
    client: ApiClient,
    registry: Arc<AdapterRegistry>,
    store: Arc<RwLock<WidgetDataStore>>,
    scheduler: PollingScheduler,
}

impl Session {
    /// Build a session that talks to the network through reqwest.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let transport = ReqwestTransport::new(config.http_timeout)?;
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(
        config: &Config,
        transport: Arc<dyn HttpTransport + Send + Sync>,
    ) -> Result<Self, AppError> {
        let metrics = Arc::new(AppMetrics::new().map_err(|err| {
            AppError::Config(format!("Failed to register metrics: {}", err))
        })?);

        let cache = Arc::new(ResponseCache::new(config.cache_ttl));
        let client = ApiClient::new(transport, cache)
            .with_retry_policy(config.retry)
            .with_metrics(Arc::clone(&metrics));
        let registry = Arc::new(AdapterRegistry::with_defaults());
        let store = Arc::new(RwLock::new(WidgetDataStore::new()));
        let scheduler =
            PollingScheduler::new(client.clone(), Arc::clone(&registry), store.clone())
                .with_metrics(Arc::clone(&metrics));

        Ok(Self {
            config: config.clone(),
            metrics,
            client,
            registry,
            store,
            scheduler,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<RwLock<WidgetDataStore>> {
        &self.store
    }

    pub fn scheduler(&self) -> &PollingScheduler {
        &self.scheduler
    }

    /// Raw JSON for `url`, through the cache.
    pub async fn fetch_raw(&self, url: &str) -> Result<Value, AppError> {
        self.client.fetch_api(url).await
    }

    /// One fetch-and-normalize with the provider taken from the URL's host.
    pub async fn fetch_and_normalize(
        &self,
        url: &str,
        view: ViewType,
    ) -> Result<NormalizedResult, AppError> {
        let provider_hint = extract_api_provider(url);
        pipeline::fetch_and_normalize(&self.client, &self.registry, &provider_hint, url, view)
            .await
    }

    /// Stop every poll and wait for the polling tasks to finish.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}
