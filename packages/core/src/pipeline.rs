//! Fetch, resolve an adapter, normalize.

use crate::adapters::{AdapterRegistry, NormalizedResult, ViewType};
use crate::error::AppError;
use crate::services::api_client::ApiClient;

/// Fetch `url` through the cache-aware client and normalize the response
/// with the first adapter of `provider_hint` that claims it.
pub async fn fetch_and_normalize(
    client: &ApiClient,
    registry: &AdapterRegistry,
    provider_hint: &str,
    url: &str,
    view: ViewType,
) -> Result<NormalizedResult, AppError> {
    let raw = client.fetch_api(url).await?;
    let adapter = registry.resolve_adapter(provider_hint, &raw)?;
    tracing::debug!("Normalizing {} with {} ({} view)", url, adapter.source(), view);
    adapter.normalize(&raw, view)
}
