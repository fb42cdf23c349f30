//! Configuration types for the PPPoE watchdog
//!
//! This module defines all configuration structures used throughout the crate.

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Control loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// PPPoE client interface to monitor (e.g., "pppoe-out1")
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Network the interface address is expected to fall within
    #[serde(default = "default_target_network")]
    pub target_network: Ipv4Net,

    /// Seconds between ticks
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Reconnects allowed before entering the holding state
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,

    /// Holding ticks after which the retry counter is cleared
    ///
    /// Set to 0 to stay in the holding state until the process restarts.
    #[serde(default)]
    pub hold_recovery_ticks: u32,

    /// Treat gateway errors during polling as a failed sample
    ///
    /// When false, any gateway error after startup ends the loop.
    #[serde(default = "default_tolerate_gateway_errors")]
    pub tolerate_gateway_errors: bool,

    /// Capacity of the event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl WatchdogConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            interface: default_interface(),
            target_network: default_target_network(),
            check_interval_secs: default_check_interval_secs(),
            max_retry: default_max_retry(),
            hold_recovery_ticks: 0,
            tolerate_gateway_errors: default_tolerate_gateway_errors(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Interval between ticks
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interface.trim().is_empty() {
            return Err(crate::Error::config("PPPoE interface name cannot be empty"));
        }

        if self.check_interval_secs == 0 {
            return Err(crate::Error::config("Check interval must be > 0"));
        }

        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        if self.target_network.network() != self.target_network.addr() {
            return Err(crate::Error::config(format!(
                "Target network {} has host bits set",
                self.target_network
            )));
        }

        Ok(())
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Router management endpoint configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Root of the router's management API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Basic-auth username
    #[serde(default = "default_username")]
    pub username: String,

    /// Basic-auth password
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub password: String,

    /// Skip TLS certificate validation
    ///
    /// Routers on a management LAN usually present self-signed certificates.
    /// Only enable this for endpoints on a trusted network.
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,

    /// Per-request timeout (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl GatewayConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            base_url: default_base_url(),
            username: default_username(),
            password: String::new(),
            accept_invalid_certs: default_accept_invalid_certs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !self.base_url.starts_with("https://") && !self.base_url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "Router URL must use HTTP or HTTPS scheme. Got: {}",
                self.base_url
            )));
        }

        if self.username.is_empty() {
            return Err(crate::Error::config("Router username cannot be empty"));
        }

        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config("Request timeout must be > 0"));
        }

        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new()
    }
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn default_interface() -> String {
    "pppoe-out1".to_string()
}

fn default_target_network() -> Ipv4Net {
    Ipv4Net::new_assert(std::net::Ipv4Addr::new(58, 32, 0, 0), 16)
}

fn default_check_interval_secs() -> u64 {
    5
}

fn default_max_retry() -> u32 {
    20
}

fn default_tolerate_gateway_errors() -> bool {
    true
}

fn default_event_channel_capacity() -> usize {
    100
}

fn default_base_url() -> String {
    "https://127.0.0.1".to_string()
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_accept_invalid_certs() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    30
}
