//! Canonical shapes produced by normalization.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::paths::get_field;

/// Rendering mode a widget asks the adapter to normalize for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    Card,
    Table,
    Chart,
}

impl ViewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewType::Card => "card",
            ViewType::Table => "table",
            ViewType::Chart => "chart",
        }
    }
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "card" => Ok(ViewType::Card),
            "table" => Ok(ViewType::Table),
            "chart" => Ok(ViewType::Chart),
            other => Err(AppError::invalid_input(format!(
                "unknown view type {:?} (expected card, table or chart)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMeta {
    /// Identifier of the adapter that produced the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Normalization time, epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<i64>,
}

/// Provider-independent result handed to renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResult {
    pub normalized_fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<NormalizedMeta>,
}

impl NormalizedResult {
    /// Wrap `normalized_fields`, stamping `source` and the current time.
    pub fn stamped(normalized_fields: Map<String, Value>, source: &str) -> Self {
        Self {
            normalized_fields,
            meta: Some(NormalizedMeta {
                source: Some(source.to_string()),
                last_updated: Some(Utc::now().timestamp_millis()),
            }),
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.meta.as_ref()?.source.as_deref()
    }

    /// Read a normalized field by path, e.g. `currencyMap.EUR[2]`.
    pub fn field(&self, path: &str) -> Option<&Value> {
        get_field(&self.normalized_fields, path)
    }
}
