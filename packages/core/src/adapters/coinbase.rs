//! Coinbase adapters.
//!
//! - `/v2/exchange-rates`: `{ data: { currency, rates: { SYMBOL: "rate" } } }`
//! - `/v2/prices/{pair}/spot|buy|sell`: `{ data: { base, currency, amount } }`

use serde_json::{json, Map, Value};

use crate::adapters::normalize::coerce_number;
use crate::adapters::registry::ApiAdapter;
use crate::adapters::types::{NormalizedResult, ViewType};
use crate::error::AppError;

/// Number of currencies shown on a card.
pub const CARD_RATE_LIMIT: usize = 3;

fn data_field<'a>(raw: &'a Value, key: &str) -> Option<&'a Value> {
    raw.get("data")?.get(key).filter(|v| !v.is_null())
}

pub struct CoinbaseRatesAdapter;

impl ApiAdapter for CoinbaseRatesAdapter {
    fn source(&self) -> &'static str {
        "coinbase-rates"
    }

    fn can_handle_response(&self, raw: &Value) -> bool {
        data_field(raw, "rates").is_some()
    }

    fn normalize(&self, raw: &Value, view: ViewType) -> Result<NormalizedResult, AppError> {
        let base_currency = data_field(raw, "currency").cloned().unwrap_or(Value::Null);
        let rates = data_field(raw, "rates")
            .and_then(Value::as_object)
            .ok_or_else(|| AppError::parse("coinbase rates payload has no `data.rates` object"))?;

        let fields = match view {
            ViewType::Card => rates_card(base_currency, rates, CARD_RATE_LIMIT),
            ViewType::Table | ViewType::Chart => rates_table(base_currency, rates),
        };
        Ok(NormalizedResult::stamped(fields, self.source()))
    }
}

/// Symbol → numeric rate, first `limit` symbols only.
fn rates_card(
    base_currency: Value,
    rates: &Map<String, Value>,
    limit: usize,
) -> Map<String, Value> {
    let currency_map: Map<String, Value> = rates
        .iter()
        .take(limit)
        .map(|(symbol, rate)| (symbol.clone(), coerce_number(rate)))
        .collect();

    let mut fields = Map::new();
    fields.insert("baseCurrency".into(), base_currency);
    fields.insert("currencyMap".into(), Value::Object(currency_map));
    fields
}

/// Symbol → `[base, symbol, rate]` for every symbol.
fn rates_table(base_currency: Value, rates: &Map<String, Value>) -> Map<String, Value> {
    let currency_map: Map<String, Value> = rates
        .iter()
        .map(|(symbol, rate)| {
            (
                symbol.clone(),
                json!([base_currency, symbol, coerce_number(rate)]),
            )
        })
        .collect();

    let mut fields = Map::new();
    fields.insert("baseCurrency".into(), base_currency);
    fields.insert("columns".into(), json!(["base", "currency", "rate"]));
    fields.insert("currencyMap".into(), Value::Object(currency_map));
    fields
}

pub struct CoinbaseSpotPriceAdapter;

impl ApiAdapter for CoinbaseSpotPriceAdapter {
    fn source(&self) -> &'static str {
        "coinbase-spot-price"
    }

    fn can_handle_response(&self, raw: &Value) -> bool {
        data_field(raw, "amount").is_some()
    }

    fn normalize(&self, raw: &Value, view: ViewType) -> Result<NormalizedResult, AppError> {
        let field = |key: &str| data_field(raw, key).cloned().unwrap_or(Value::Null);
        let mut price = Map::new();
        price.insert("base".into(), field("base"));
        price.insert("currency".into(), field("currency"));
        price.insert("amount".into(), coerce_number(&field("amount")));

        let fields = match view {
            ViewType::Card => price,
            ViewType::Table | ViewType::Chart => {
                let mut fields = Map::new();
                fields.insert("columns".into(), json!(["base", "currency", "amount"]));
                fields.insert("rows".into(), Value::Array(vec![Value::Object(price)]));
                fields
            }
        };
        Ok(NormalizedResult::stamped(fields, self.source()))
    }
}
