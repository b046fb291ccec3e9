//! Tracker configuration, built once at startup and passed down

use coldchain_core::{ShipmentId, Topic};
use coldchain_networking::websocket::BackoffPolicy;
use std::time::Duration;

/// Per-shipment socket path; `{id}` is replaced with the shipment id
pub const DEFAULT_TRACKING_PATH: &str = "/ws/shipments/{id}/";

/// Everything a tracker needs to know about where and how to connect
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Already-resolved API origin, e.g. `https://ops.example.com`
    pub base_url: String,
    pub tracking_path: String,
    pub topic: Topic,
    pub backoff: BackoffPolicy,
}

impl TrackerConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_backoff(
        mut self,
        base_delay: Duration,
        max_delay: Duration,
        max_attempts: u32,
    ) -> Self {
        self.backoff = BackoffPolicy {
            base_delay,
            max_delay,
            max_attempts,
        };
        self
    }

    /// Socket URL for one shipment (still `http(s)`; the manager rewrites it)
    pub fn socket_url(&self, shipment: &ShipmentId) -> String {
        let path = self.tracking_path.replace("{id}", shipment.as_str());
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            tracking_path: DEFAULT_TRACKING_PATH.to_string(),
            topic: Topic::shipments(),
            backoff: BackoffPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_url() {
        let config = TrackerConfig::new("https://ops.example.com/");
        assert_eq!(
            config.socket_url(&ShipmentId::new("SHP-9")),
            "https://ops.example.com/ws/shipments/SHP-9/"
        );

        let config = TrackerConfig {
            tracking_path: "tracking/{id}".to_string(),
            ..TrackerConfig::new("http://10.0.2.2:8000")
        };
        assert_eq!(
            config.socket_url(&ShipmentId::new("7")),
            "http://10.0.2.2:8000/tracking/7"
        );
    }

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.topic.as_str(), "shipments");
        assert_eq!(config.backoff.max_attempts, 5);
        assert_eq!(config.backoff.base_delay, Duration::from_secs(1));
        assert_eq!(config.backoff.max_delay, Duration::from_secs(30));
    }
}
