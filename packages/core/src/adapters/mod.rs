//! Provider adapters.
//!
//! Each external API gets an ordered list of adapters. Resolution picks the
//! provider from a hint string, then the first adapter whose structural check
//! claims the raw response, and that adapter normalizes the payload into a
//! [`NormalizedResult`] for the requested [`ViewType`].

pub mod alphavantage;
pub mod coinbase;
pub mod normalize;
pub mod provider;
pub mod registry;
pub mod types;

pub use provider::{extract_api_provider, Provider};
pub use registry::{AdapterRegistry, ApiAdapter};
pub use types::{NormalizedMeta, NormalizedResult, ViewType};
