//! Per-widget polling scheduler.
//!
//! Each widget gets its own Tokio task: one cycle runs immediately, then one
//! per interval tick. A cycle publishes `loading`, fetches and normalizes the
//! widget's URL, then publishes `success` or `error`. Errors never end the
//! loop; the next tick tries again.
//!
//! Cycles for one widget never overlap: the cycle runs inside the widget's
//! task and ticks missed while it was in flight are skipped. Stopping a widget
//! cancels its token, after which nothing more is published for that poll.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::adapters::{extract_api_provider, AdapterRegistry, ViewType};
use crate::metrics::AppMetrics;
use crate::pipeline::fetch_and_normalize;
use crate::services::api_client::ApiClient;
use crate::store::{DataSink, WidgetUpdate};

/// Shortest interval a poll may run at.
pub const MIN_INTERVAL_SECONDS: u64 = 1;

struct ActivePoll {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Returned by [`PollingScheduler::start_polling`].
#[derive(Debug, Clone)]
pub struct PollHandle {
    widget_id: String,
    cancel: CancellationToken,
}

impl PollHandle {
    pub fn widget_id(&self) -> &str {
        &self.widget_id
    }

    /// `false` once the poll was stopped or replaced.
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct PollingScheduler {
    client: ApiClient,
    registry: Arc<AdapterRegistry>,
    sink: Arc<dyn DataSink + Send + Sync>,
    metrics: Option<Arc<AppMetrics>>,
    active: Mutex<HashMap<String, ActivePoll>>,
}

impl PollingScheduler {
    pub fn new(
        client: ApiClient,
        registry: Arc<AdapterRegistry>,
        sink: Arc<dyn DataSink + Send + Sync>,
    ) -> Self {
        Self {
            client,
            registry,
            sink,
            metrics: None,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<AppMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Start polling `url` for `widget_id`, replacing any poll already
    /// running for that widget. Returns `None` when `url` is empty.
    pub fn start_polling(
        &self,
        widget_id: &str,
        url: &str,
        interval_seconds: u64,
        view: ViewType,
    ) -> Option<PollHandle> {
        if url.is_empty() {
            tracing::debug!("Widget {} has no URL, not polling", widget_id);
            return None;
        }

        if interval_seconds < MIN_INTERVAL_SECONDS {
            tracing::warn!(
                "Widget {} interval {}s is below the minimum, using {}s",
                widget_id,
                interval_seconds,
                MIN_INTERVAL_SECONDS
            );
        }
        let period = Duration::from_secs(interval_seconds.max(MIN_INTERVAL_SECONDS));

        let cancel = CancellationToken::new();
        let cycle = PollCycle {
            widget_id: widget_id.to_string(),
            url: url.to_string(),
            view,
            client: self.client.clone(),
            registry: Arc::clone(&self.registry),
            sink: Arc::clone(&self.sink),
            metrics: self.metrics.clone(),
        };

        {
            let mut active = lock(&self.active);
            // The old poll is cancelled before the new one can publish.
            if let Some(previous) = active.remove(widget_id) {
                previous.cancel.cancel();
                tracing::debug!("Replaced existing poll for widget {}", widget_id);
            }
            let task = tokio::spawn(run_poll_loop(cycle, period, cancel.clone()));
            active.insert(
                widget_id.to_string(),
                ActivePoll {
                    cancel: cancel.clone(),
                    task,
                },
            );
            self.record_active(active.len());
        }

        tracing::info!(
            "Polling started for widget {} (interval: {}s, view: {}): {}",
            widget_id,
            period.as_secs(),
            view,
            url
        );

        Some(PollHandle {
            widget_id: widget_id.to_string(),
            cancel,
        })
    }

    /// Stop polling `widget_id`. Safe to call when nothing is running.
    pub fn stop_polling(&self, widget_id: &str) {
        let removed = {
            let mut active = lock(&self.active);
            let removed = active.remove(widget_id);
            self.record_active(active.len());
            removed
        };
        if let Some(poll) = removed {
            poll.cancel.cancel();
            tracing::info!("Polling stopped for widget {}", widget_id);
        }
    }

    /// Stop every active poll.
    pub fn stop_all(&self) {
        let drained: Vec<(String, ActivePoll)> = lock(&self.active).drain().collect();
        self.record_active(0);
        for (_, poll) in &drained {
            poll.cancel.cancel();
        }
        if !drained.is_empty() {
            tracing::info!("Stopped polling for {} widget(s)", drained.len());
        }
    }

    /// Stop every poll and wait for their tasks to exit.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, ActivePoll)> = lock(&self.active).drain().collect();
        self.record_active(0);
        for (_, poll) in &drained {
            poll.cancel.cancel();
        }
        for (widget_id, poll) in drained {
            if let Err(err) = poll.task.await {
                tracing::error!("Polling task for widget {} ended abnormally: {}", widget_id, err);
            }
        }
        tracing::info!("Polling scheduler stopped cleanly");
    }

    pub fn is_polling(&self, widget_id: &str) -> bool {
        lock(&self.active)
            .get(widget_id)
            .is_some_and(|poll| !poll.cancel.is_cancelled())
    }

    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }

    fn record_active(&self, count: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.active_polls.set(count as f64);
        }
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        for poll in lock(&self.active).values() {
            poll.cancel.cancel();
        }
    }
}

/// Everything one widget's cycle needs, owned by its task.
struct PollCycle {
    widget_id: String,
    url: String,
    view: ViewType,
    client: ApiClient,
    registry: Arc<AdapterRegistry>,
    sink: Arc<dyn DataSink + Send + Sync>,
    metrics: Option<Arc<AppMetrics>>,
}

async fn run_poll_loop(cycle: PollCycle, period: Duration, cancel: CancellationToken) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            _ = interval.tick() => cycle.run(&cancel).await,
        }
    }

    tracing::debug!("Polling loop for widget {} exited", cycle.widget_id);
}

impl PollCycle {
    /// One fetch + normalize + publish attempt. Never fails; every error
    /// becomes an `error` publication.
    async fn run(&self, cancel: &CancellationToken) {
        if let Some(metrics) = &self.metrics {
            metrics.polls_total.inc();
        }
        if !self.publish(cancel, WidgetUpdate::loading()).await {
            return;
        }

        let provider_hint = extract_api_provider(&self.url);
        let outcome = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                tracing::debug!(
                    "Widget {} stopped mid-cycle, discarding result",
                    self.widget_id
                );
                return;
            }

            outcome = fetch_and_normalize(
                &self.client,
                &self.registry,
                &provider_hint,
                &self.url,
                self.view,
            ) => outcome,
        };

        let update = match outcome {
            Ok(result) => {
                tracing::debug!(
                    "Widget {} updated from {}",
                    self.widget_id,
                    result.source().unwrap_or("unknown source")
                );
                WidgetUpdate::success(result)
            }
            Err(err) => {
                if let Some(metrics) = &self.metrics {
                    metrics.poll_errors_total.inc();
                }
                tracing::warn!("Widget {} poll failed: {}", self.widget_id, err);
                WidgetUpdate::error(err.to_string())
            }
        };
        self.publish(cancel, update).await;
    }

    /// Hand `update` to the sink unless the poll is cancelled first, including
    /// while the sink is still waiting for its lock. Returns whether it landed.
    async fn publish(&self, cancel: &CancellationToken, update: WidgetUpdate) -> bool {
        let status = update.status;
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                tracing::debug!("Widget {} stopped, dropping {:?} update", self.widget_id, status);
                false
            }

            _ = self.sink.publish(&self.widget_id, update) => true,
        }
    }
}
