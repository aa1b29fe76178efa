//! In-memory widget data store.
//!
//! `WidgetDataStore` keeps the latest status, data and error for each widget
//! id. The polling scheduler writes to it through the [`DataSink`] trait;
//! renderers read it. Updates are partial: a field left out of an update keeps
//! its previous value, so a widget that goes back to `loading` still shows
//! the data from its last successful cycle.
//!
//! Callers share the store as `Arc<RwLock<WidgetDataStore>>` between polling
//! tasks and readers; the lock is what implements [`DataSink`].

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::adapters::NormalizedResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// A partial update for one widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetUpdate {
    pub status: DataStatus,
    pub data: Option<NormalizedResult>,
    pub error: Option<String>,
    pub last_fetched_at: Option<i64>,
}

impl WidgetUpdate {
    pub fn loading() -> Self {
        Self {
            status: DataStatus::Loading,
            data: None,
            error: None,
            last_fetched_at: None,
        }
    }

    pub fn success(data: NormalizedResult) -> Self {
        Self {
            status: DataStatus::Success,
            data: Some(data),
            error: None,
            last_fetched_at: Some(Utc::now().timestamp_millis()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: DataStatus::Error,
            data: None,
            error: Some(message.into()),
            last_fetched_at: Some(Utc::now().timestamp_millis()),
        }
    }
}

/// Current state of one widget as seen by renderers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetDataState {
    pub status: DataStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<NormalizedResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fetched_at: Option<i64>,
}

impl WidgetDataState {
    fn apply(&mut self, update: WidgetUpdate) {
        self.status = update.status;
        if update.data.is_some() {
            self.data = update.data;
        }
        if update.error.is_some() {
            self.error = update.error;
        }
        if update.last_fetched_at.is_some() {
            self.last_fetched_at = update.last_fetched_at;
        }
    }
}

/// Receiver of widget status transitions.
#[async_trait]
pub trait DataSink {
    async fn publish(&self, widget_id: &str, update: WidgetUpdate);
}

#[derive(Debug, Default)]
pub struct WidgetDataStore {
    data: HashMap<String, WidgetDataState>,
}

impl WidgetDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `update` into the widget's state, creating it if needed.
    pub fn set_data(&mut self, widget_id: &str, update: WidgetUpdate) {
        self.data
            .entry(widget_id.to_string())
            .or_default()
            .apply(update);
    }

    pub fn get(&self, widget_id: &str) -> Option<&WidgetDataState> {
        self.data.get(widget_id)
    }

    pub fn clear_data(&mut self, widget_id: &str) {
        self.data.remove(widget_id);
    }

    /// All widget states ordered by id.
    pub fn snapshot(&self) -> BTreeMap<String, WidgetDataState> {
        self.data
            .iter()
            .map(|(id, state)| (id.clone(), state.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl DataSink for RwLock<WidgetDataStore> {
    async fn publish(&self, widget_id: &str, update: WidgetUpdate) {
        match &update.error {
            Some(error) => tracing::info!("Widget {} -> {:?}: {}", widget_id, update.status, error),
            None => tracing::info!("Widget {} -> {:?}", widget_id, update.status),
        }
        self.write().await.set_data(widget_id, update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn result() -> NormalizedResult {
        NormalizedResult::stamped(Map::new(), "test")
    }

    #[test]
    fn new_store_is_empty() {
        let store = WidgetDataStore::new();
        assert!(store.is_empty());
        assert!(store.get("w1").is_none());
    }

    #[test]
    fn loading_keeps_previous_data() {
        let data = result();
        let mut store = WidgetDataStore::new();
        store.set_data("w1", WidgetUpdate::success(data.clone()));
        store.set_data("w1", WidgetUpdate::loading());

        let state = store.get("w1").unwrap();
        assert_eq!(state.status, DataStatus::Loading);
        assert_eq!(state.data.as_ref(), Some(&data));
        assert!(state.last_fetched_at.is_some());
    }

    #[test]
    fn error_sets_message_and_keeps_data() {
        let mut store = WidgetDataStore::new();
        store.set_data("w1", WidgetUpdate::success(result()));
        store.set_data("w1", WidgetUpdate::error("API failed: 500 Internal Server Error"));

        let state = store.get("w1").unwrap();
        assert_eq!(state.status, DataStatus::Error);
        assert_eq!(
            state.error.as_deref(),
            Some("API failed: 500 Internal Server Error")
        );
        assert!(state.data.is_some());
    }

    #[test]
    fn clear_data_removes_widget() {
        let mut store = WidgetDataStore::new();
        store.set_data("w1", WidgetUpdate::loading());
        store.set_data("w2", WidgetUpdate::loading());
        store.clear_data("w1");

        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot().keys().collect::<Vec<_>>(), vec!["w2"]);
    }

    #[tokio::test]
    async fn rwlock_store_acts_as_sink() {
        let store = RwLock::new(WidgetDataStore::new());
        store.publish("w1", WidgetUpdate::error("boom")).await;

        let guard = store.read().await;
        assert_eq!(guard.get("w1").unwrap().status, DataStatus::Error);
    }

    #[test]
    fn state_serializes_camel_case_and_skips_empty_fields() {
        let mut store = WidgetDataStore::new();
        store.set_data("w1", WidgetUpdate::error("boom"));

        let value = serde_json::to_value(store.get("w1").unwrap()).unwrap();
        assert_eq!(value["status"], "error");
        assert!(value["lastFetchedAt"].is_i64());
        assert!(value.get("data").is_none());
    }
}
