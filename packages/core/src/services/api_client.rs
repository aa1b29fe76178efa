//! Cache-aware API client with bounded retry.
//!
//! `fetch_api` answers from the response cache when it can, joins an
//! in-flight request for the same URL when one exists, and otherwise starts a
//! retrying fetch whose result is written back into the cache.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tokio::time::Instant;

use crate::cache::{ResponseCache, SharedRequest};
use crate::error::AppError;
use crate::metrics::AppMetrics;
use crate::services::http::HttpTransport;

pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Linear backoff: attempt `n` (zero-based) waits `base_delay * (n + 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * (attempt + 1)
    }
}

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport + Send + Sync>,
    cache: Arc<ResponseCache<Value>>,
    retry: RetryPolicy,
    metrics: Option<Arc<AppMetrics>>,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn HttpTransport + Send + Sync>,
        cache: Arc<ResponseCache<Value>>,
    ) -> Self {
        Self {
            transport,
            cache,
            retry: RetryPolicy::default(),
            metrics: None,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<AppMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn cache(&self) -> &Arc<ResponseCache<Value>> {
        &self.cache
    }

    /// Fetch `url`, preferring a fresh cache entry, then an in-flight request.
    pub async fn fetch_api(&self, url: &str) -> Result<Value, AppError> {
        if url.is_empty() {
            return Err(AppError::invalid_input("URL is required"));
        }

        if let Some(cached) = self.cache.get(url) {
            tracing::debug!("Cache hit for {}", url);
            if let Some(metrics) = &self.metrics {
                metrics.cache_hits_total.inc();
            }
            return Ok(cached);
        }

        let (request, joined) = self
            .cache
            .pending_or_register(url, || self.start_request(url));
        if joined {
            tracing::debug!("Joining in-flight request for {}", url);
            if let Some(metrics) = &self.metrics {
                metrics.deduplicated_requests_total.inc();
            }
        }

        request.await
    }

    /// Drop any cached entry for `url` and fetch it again.
    ///
    /// The fresh result is returned but not written back into the cache.
    pub async fn fetch_api_fresh(&self, url: &str) -> Result<Value, AppError> {
        if url.is_empty() {
            return Err(AppError::invalid_input("URL is required"));
        }

        self.cache.invalidate(url);
        self.fetch_with_retry(url).await
    }

    /// Fetch `url` directly, retrying failed attempts per the retry policy.
    pub async fn fetch_with_retry(&self, url: &str) -> Result<Value, AppError> {
        fetch_with_retry(
            self.transport.as_ref(),
            url,
            self.retry,
            self.metrics.as_deref(),
        )
        .await
    }

    fn start_request(&self, url: &str) -> SharedRequest<Value> {
        let transport = Arc::clone(&self.transport);
        let cache = Arc::clone(&self.cache);
        let metrics = self.metrics.clone();
        let retry = self.retry;
        let url = url.to_string();

        async move {
            let data =
                fetch_with_retry(transport.as_ref(), &url, retry, metrics.as_deref()).await?;
            cache.set(&url, data.clone());
            Ok(data)
        }
        .boxed()
        .shared()
    }
}

/// Attempt the request up to `retry.retries + 1` times.
///
/// Only the final attempt's error is surfaced. Errors that say nothing about
/// transience (bad input) are returned without retrying.
pub async fn fetch_with_retry(
    transport: &(dyn HttpTransport + Send + Sync),
    url: &str,
    retry: RetryPolicy,
    metrics: Option<&AppMetrics>,
) -> Result<Value, AppError> {
    let started = Instant::now();
    let mut attempt = 0;

    loop {
        match transport.get_json(url).await {
            Ok(data) => {
                if let Some(metrics) = metrics {
                    metrics
                        .upstream_requests_total
                        .with_label_values(&["success"])
                        .inc();
                    metrics
                        .fetch_duration
                        .observe(started.elapsed().as_secs_f64());
                }
                return Ok(data);
            }
            Err(err) => {
                if let Some(metrics) = metrics {
                    metrics
                        .upstream_requests_total
                        .with_label_values(&["error"])
                        .inc();
                }

                if attempt >= retry.retries || !err.is_retryable() {
                    tracing::warn!(
                        "Fetch of {} failed after {} attempt(s): {}",
                        url,
                        attempt + 1,
                        err
                    );
                    return Err(err);
                }

                let delay = retry.delay_for(attempt);
                tracing::debug!(
                    "Attempt {} for {} failed ({}), retrying in {:?}",
                    attempt + 1,
                    url,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
