//! Outbound HTTP: the transport seam and the cache-aware client built on it.

pub mod api_client;
pub mod http;
#[cfg(test)]
pub mod mock_transport;
