//! AlphaVantage adapters.
//!
//! Time-series endpoints return `{ "Meta Data": {...}, "Time Series (Daily)":
//! { "2024-01-02": { "1. open": "187.15", ... }, ... } }` (weekly, monthly and
//! intraday variants differ only in the series key). `GLOBAL_QUOTE` returns
//! `{ "Global Quote": { "01. symbol": "IBM", "05. price": "187.1", ... } }`.

use serde_json::{Map, Value};

use crate::adapters::normalize::{clean_key, coerce_number};
use crate::adapters::registry::ApiAdapter;
use crate::adapters::types::{NormalizedResult, ViewType};
use crate::error::AppError;

const SERIES_MARKER: &str = "Time Series";
const META_KEY: &str = "Meta Data";
const QUOTE_KEY: &str = "Global Quote";

fn series_entry(raw: &Value) -> Option<(&String, &Value)> {
    raw.as_object()?
        .iter()
        .find(|(key, value)| key.contains(SERIES_MARKER) && !value.is_null())
}

pub struct AlphaVantageTimeSeriesAdapter;

impl ApiAdapter for AlphaVantageTimeSeriesAdapter {
    fn source(&self) -> &'static str {
        "alphavantage-time-series"
    }

    fn can_handle_response(&self, raw: &Value) -> bool {
        series_entry(raw).is_some()
    }

    fn normalize(&self, raw: &Value, view: ViewType) -> Result<NormalizedResult, AppError> {
        let (series_key, series) = series_entry(raw)
            .ok_or_else(|| AppError::parse("alphavantage payload has no time series"))?;
        let series = series
            .as_object()
            .ok_or_else(|| AppError::parse(format!("{:?} is not an object", series_key)))?;

        let mut fields = Map::new();
        fields.insert(
            "metaInformation".into(),
            raw.get(META_KEY).cloned().unwrap_or(Value::Null),
        );

        let rows = series_rows(series)?;
        match view {
            ViewType::Card => {
                let latest = rows.into_iter().next().map(Value::Object).unwrap_or(Value::Null);
                fields.insert("latest".into(), latest);
            }
            ViewType::Table | ViewType::Chart => {
                let columns = union_columns(&rows);
                let mut table = Map::new();
                table.insert(
                    "columns".into(),
                    Value::Array(columns.into_iter().map(Value::String).collect()),
                );
                table.insert(
                    "rows".into(),
                    Value::Array(rows.into_iter().map(Value::Object).collect()),
                );
                fields.insert("timeSeries".into(), Value::Object(table));
            }
        }

        Ok(NormalizedResult::stamped(fields, self.source()))
    }
}

/// One row per date, most recent first, with cleaned keys and numeric values.
fn series_rows(series: &Map<String, Value>) -> Result<Vec<Map<String, Value>>, AppError> {
    let mut dates: Vec<&String> = series.keys().collect();
    dates.sort_unstable_by(|a, b| b.cmp(a));

    dates
        .into_iter()
        .map(|date| {
            let entry = series[date.as_str()].as_object().ok_or_else(|| {
                AppError::parse(format!("time series entry for {} is not an object", date))
            })?;

            let mut row = Map::new();
            row.insert("date".into(), Value::String(date.clone()));
            for (key, value) in entry {
                row.insert(clean_key(key), coerce_number(value));
            }
            Ok(row)
        })
        .collect()
}

/// `"date"` followed by every other key in first-seen order.
fn union_columns(rows: &[Map<String, Value>]) -> Vec<String> {
    let mut columns = vec!["date".to_string()];
    for key in rows.iter().flat_map(|row| row.keys()) {
        if !columns.contains(key) {
            columns.push(key.clone());
        }
    }
    columns
}

pub struct AlphaVantageGlobalQuoteAdapter;

impl ApiAdapter for AlphaVantageGlobalQuoteAdapter {
    fn source(&self) -> &'static str {
        "alphavantage-global-quote"
    }

    fn can_handle_response(&self, raw: &Value) -> bool {
        raw.get(QUOTE_KEY).is_some_and(|quote| !quote.is_null())
    }

    fn normalize(&self, raw: &Value, view: ViewType) -> Result<NormalizedResult, AppError> {
        let quote = raw
            .get(QUOTE_KEY)
            .and_then(Value::as_object)
            .ok_or_else(|| AppError::parse("\"Global Quote\" is not an object"))?;

        let cleaned: Map<String, Value> = quote
            .iter()
            .map(|(key, value)| (clean_key(key), coerce_number(value)))
            .collect();

        let fields = match view {
            ViewType::Card => cleaned,
            ViewType::Table | ViewType::Chart => {
                let mut fields = Map::new();
                fields.insert(
                    "columns".into(),
                    Value::Array(cleaned.keys().cloned().map(Value::String).collect()),
                );
                fields.insert("rows".into(), Value::Array(vec![Value::Object(cleaned)]));
                fields
            }
        };

        Ok(NormalizedResult::stamped(fields, self.source()))
    }
}
