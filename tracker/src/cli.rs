//! Command-line and environment configuration

use clap::Parser;
use coldchain_engine::config::{TrackerConfig, DEFAULT_TRACKING_PATH};
use coldchain_core::ShipmentId;
use std::time::Duration;

/// Follow a shipment's live location, temperature and alerts
#[derive(Debug, Parser)]
#[command(name = "coldchain-tracker", version)]
pub struct Args {
    /// Shipment to track
    #[arg(required_unless_present = "list")]
    pub shipment: Option<String>,

    /// List in-transit shipments and exit
    #[arg(long)]
    pub list: bool,

    /// API origin; the tracking socket is derived from it
    #[arg(long, env = "COLDCHAIN_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Bearer token for REST calls
    #[arg(long, env = "COLDCHAIN_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Socket path template; `{id}` is the shipment id
    #[arg(long, env = "COLDCHAIN_TRACKING_PATH", default_value = DEFAULT_TRACKING_PATH)]
    pub tracking_path: String,

    #[arg(long, env = "COLDCHAIN_RECONNECT_BASE_MS", default_value_t = 1000)]
    pub reconnect_base_ms: u64,

    #[arg(long, env = "COLDCHAIN_RECONNECT_CAP_MS", default_value_t = 30_000)]
    pub reconnect_cap_ms: u64,

    #[arg(long, env = "COLDCHAIN_RECONNECT_ATTEMPTS", default_value_t = 5)]
    pub max_reconnect_attempts: u32,

    /// Keep running after automatic reconnection gives up, retrying
    /// manually every this many seconds
    #[arg(long)]
    pub retry_after_give_up_secs: Option<u64>,
}

impl Args {
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            tracking_path: self.tracking_path.clone(),
            ..TrackerConfig::new(self.api_url.clone())
        }
        .with_backoff(
            Duration::from_millis(self.reconnect_base_ms),
            Duration::from_millis(self.reconnect_cap_ms),
            self.max_reconnect_attempts,
        )
    }

    pub fn shipment_id(&self) -> Option<ShipmentId> {
        self.shipment.as_deref().map(ShipmentId::new)
    }
}
