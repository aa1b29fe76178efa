//! Prometheus metrics registry for the widget feed.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once per session, wrap in `Arc`, and pass it to
//! the fetch client and the polling scheduler.

use prometheus::{Counter, CounterVec, Gauge, Histogram, HistogramOpts, Opts, Registry};

/// All application-level Prometheus metrics.
pub struct AppMetrics {
    /// Polling cycles started (success + failure).
    pub polls_total: Counter,
    /// Polling cycles that ended in an error publication.
    pub poll_errors_total: Counter,
    /// Widgets with an active polling loop.
    pub active_polls: Gauge,
    /// Upstream HTTP attempts, labelled by outcome (`success` / `error`).
    pub upstream_requests_total: CounterVec,
    /// `fetch_api` calls answered from a fresh cache entry.
    pub cache_hits_total: Counter,
    /// `fetch_api` calls that joined a request already in flight.
    pub deduplicated_requests_total: Counter,
    /// Latency of a full retrying fetch in seconds.
    pub fetch_duration: Histogram,
    /// The registry that owns all of the above metrics.
    pub registry: Registry,
}

impl AppMetrics {
    /// Create and register all metrics. Returns an error if any metric
    /// name is invalid or duplicated.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let polls_total = Counter::with_opts(Opts::new(
            "widget_feed_polls_total",
            "Total widget polling cycles",
        ))?;

        let poll_errors_total = Counter::with_opts(Opts::new(
            "widget_feed_poll_errors_total",
            "Widget polling cycles that failed",
        ))?;

        let active_polls = Gauge::with_opts(Opts::new(
            "widget_feed_active_polls",
            "Widgets currently being polled",
        ))?;

        let upstream_requests_total = CounterVec::new(
            Opts::new(
                "widget_feed_upstream_requests_total",
                "Upstream HTTP attempts by outcome",
            ),
            &["outcome"],
        )?;

        let cache_hits_total = Counter::with_opts(Opts::new(
            "widget_feed_cache_hits_total",
            "Fetches served from the response cache",
        ))?;

        let deduplicated_requests_total = Counter::with_opts(Opts::new(
            "widget_feed_deduplicated_requests_total",
            "Fetches that joined an in-flight request",
        ))?;

        let fetch_duration = Histogram::with_opts(
            HistogramOpts::new(
                "widget_feed_fetch_duration_seconds",
                "Retrying fetch latency in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;

        registry.register(Box::new(polls_total.clone()))?;
        registry.register(Box::new(poll_errors_total.clone()))?;
        registry.register(Box::new(active_polls.clone()))?;
        registry.register(Box::new(upstream_requests_total.clone()))?;
        registry.register(Box::new(cache_hits_total.clone()))?;
        registry.register(Box::new(deduplicated_requests_total.clone()))?;
        registry.register(Box::new(fetch_duration.clone()))?;

        Ok(Self {
            polls_total,
            poll_errors_total,
            active_polls,
            upstream_requests_total,
            cache_hits_total,
            deduplicated_requests_total,
            fetch_duration,
            registry,
        })
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}
