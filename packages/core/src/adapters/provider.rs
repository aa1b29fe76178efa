//! Known API providers and how a URL maps onto one.

use std::fmt;

use reqwest::Url;

/// External APIs with a registered set of adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Coinbase,
    AlphaVantage,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Coinbase, Provider::AlphaVantage];

    /// The hint string used to select this provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Coinbase => "coinbase",
            Provider::AlphaVantage => "alphavantage",
        }
    }

    pub fn from_hint(hint: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == hint)
    }

    /// Infer the provider from the URL hostname. Unparsable URLs and unknown
    /// hosts yield `None`.
    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        Self::ALL.into_iter().find(|p| host.contains(p.as_str()))
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider hint for `url`, or an empty string when none applies.
pub fn extract_api_provider(url: &str) -> String {
    Provider::from_url(url)
        .map(|p| p.as_str().to_string())
        .unwrap_or_default()
}
