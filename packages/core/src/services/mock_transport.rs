//! Scripted in-memory transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use crate::error::AppError;
use crate::services::http::HttpTransport;

/// Transport that replays scripted results per URL.
///
/// Each URL holds a queue of results. Results are consumed in order and the
/// last one repeats forever. Unknown URLs fail with a network error.
#[derive(Default)]
pub struct MockTransport {
    scripts: Mutex<HashMap<String, VecDeque<Result<Value, AppError>>>>,
    calls: Mutex<Vec<(String, Instant)>>,
    delay: Duration,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, url: &str, body: Value) -> Self {
        self.push(url, Ok(body));
        self
    }

    pub fn with_error(self, url: &str, err: AppError) -> Self {
        self.push(url, Err(err));
        self
    }

    /// Every call sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push(&self, url: &str, result: Result<Value, AppError>) {
        lock(&self.scripts)
            .entry(url.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        lock(&self.calls).iter().filter(|(called, _)| called == url).count()
    }

    /// When each call for `url` arrived, in order.
    pub fn call_times(&self, url: &str) -> Vec<Instant> {
        lock(&self.calls)
            .iter()
            .filter(|(called, _)| called == url)
            .map(|(_, at)| *at)
            .collect()
    }

    fn next_result(&self, url: &str) -> Result<Value, AppError> {
        let mut scripts = lock(&self.scripts);
        let Some(queue) = scripts.get_mut(url) else {
            return Err(AppError::network(format!("no scripted response for {}", url)));
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap_or_else(|| Err(AppError::network("empty script")))
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(AppError::network("empty script")))
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get_json(&self, url: &str) -> Result<Value, AppError> {
        lock(&self.calls).push((url.to_string(), Instant::now()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.next_result(url)
    }
}
