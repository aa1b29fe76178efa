//! Adapter contract and the per-provider registry that resolves one.

use std::sync::Arc;

use serde_json::Value;

use crate::adapters::alphavantage::{AlphaVantageGlobalQuoteAdapter, AlphaVantageTimeSeriesAdapter};
use crate::adapters::coinbase::{CoinbaseRatesAdapter, CoinbaseSpotPriceAdapter};
use crate::adapters::provider::Provider;
use crate::adapters::types::{NormalizedResult, ViewType};
use crate::error::AppError;

/// Translator from one provider response shape to a [`NormalizedResult`].
///
/// Adapters are stateless. Detection must stay cheap: key presence checks,
/// no deep validation.
pub trait ApiAdapter: Send + Sync {
    /// Stable identifier, stamped into `meta.source`.
    fn source(&self) -> &'static str;

    fn can_handle_response(&self, raw: &Value) -> bool;

    fn normalize(&self, raw: &Value, view: ViewType) -> Result<NormalizedResult, AppError>;
}

/// Ordered adapter lists, one per provider. Earlier adapters win.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    coinbase: Vec<Arc<dyn ApiAdapter>>,
    alphavantage: Vec<Arc<dyn ApiAdapter>>,
}

impl AdapterRegistry {
    /// A registry with no adapters at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in adapters for every known provider.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Provider::Coinbase, Arc::new(CoinbaseRatesAdapter));
        registry.register(Provider::Coinbase, Arc::new(CoinbaseSpotPriceAdapter));
        registry.register(Provider::AlphaVantage, Arc::new(AlphaVantageTimeSeriesAdapter));
        registry.register(Provider::AlphaVantage, Arc::new(AlphaVantageGlobalQuoteAdapter));
        registry
    }

    /// Append `adapter` to `provider`'s list, after everything already there.
    pub fn register(&mut self, provider: Provider, adapter: Arc<dyn ApiAdapter>) {
        self.adapters_mut(provider).push(adapter);
    }

    pub fn adapters(&self, provider: Provider) -> &[Arc<dyn ApiAdapter>] {
        match provider {
            Provider::Coinbase => &self.coinbase,
            Provider::AlphaVantage => &self.alphavantage,
        }
    }

    fn adapters_mut(&mut self, provider: Provider) -> &mut Vec<Arc<dyn ApiAdapter>> {
        match provider {
            Provider::Coinbase => &mut self.coinbase,
            Provider::AlphaVantage => &mut self.alphavantage,
        }
    }

    /// First adapter of the hinted provider that claims `raw`.
    pub fn resolve_adapter(
        &self,
        provider_hint: &str,
        raw: &Value,
    ) -> Result<Arc<dyn ApiAdapter>, AppError> {
        let provider = Provider::from_hint(provider_hint)
            .ok_or_else(|| AppError::UnsupportedProvider(provider_hint.to_string()))?;

        self.adapters(provider)
            .iter()
            .find(|adapter| adapter.can_handle_response(raw))
            .cloned()
            .ok_or_else(|| AppError::UnsupportedEndpoint(provider.to_string()))
    }
}
