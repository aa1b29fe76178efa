use std::time::Duration;

use clap::Parser;

use crate::adapters::ViewType;
use crate::config::Config;

/// Widget feed CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "widget-feed",
    version,
    about = "Poll JSON APIs and normalize their responses into widget data"
)]
pub struct Cli {
    /// API URL to fetch (repeat for several widgets)
    #[arg(long = "url", required = true)]
    pub urls: Vec<String>,

    /// How widgets render the data (card, table or chart)
    #[arg(long, default_value = "card")]
    pub view: ViewType,

    /// Polling interval in seconds
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Response cache TTL in milliseconds
    #[arg(long)]
    pub cache_ttl_ms: Option<u64>,

    /// Fetch and normalize each URL once, print the result and exit
    #[arg(long)]
    pub once: bool,

    /// Print the field paths of each raw response and exit
    #[arg(long, conflicts_with = "once")]
    pub paths: bool,

    /// Print Prometheus metrics before exiting
    #[arg(long)]
    pub metrics: bool,
}

impl Cli {
    /// Override `config` with any values given on the command line.
    pub fn apply(&self, config: &mut Config) {
        if let Some(seconds) = self.poll_interval {
            config.poll_interval_seconds = seconds;
        }
        if let Some(ms) = self.cache_ttl_ms {
            config.cache_ttl = Duration::from_millis(ms);
        }
    }
}
