//! Configuration types for ember-dns.

use serde::{Deserialize, Serialize};
use std::net::{Ipv6Addr, SocketAddr};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    #[serde(default)]
    pub dns: DnsConfig,

    /// Update API configuration.
    #[serde(default)]
    pub api: ApiConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address for the DNS server to listen on (UDP and TCP).
    #[serde(default = "default_dns_listen_addr")]
    pub listen_addr: SocketAddr,

    /// How often to re-derive zone serials from the wall clock, in seconds.
    #[serde(default = "default_serial_refresh_interval")]
    pub serial_refresh_interval_secs: u64,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_dns_listen_addr(),
            serial_refresh_interval_secs: default_serial_refresh_interval(),
        }
    }
}

/// HTTP update API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address for the update API to listen on.
    #[serde(default = "default_api_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_api_listen_addr(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level. A bare level like "debug" applies to this crate only;
    /// full filter strings such as "ember_dns=debug,warn" are used as-is.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,

    /// OpenTelemetry configuration.
    #[serde(default)]
    pub opentelemetry: Option<OpenTelemetryConfig>,
}

/// OpenTelemetry exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTelemetryConfig {
    /// OTLP endpoint (e.g., "http://localhost:4317").
    pub endpoint: String,

    /// Service name for traces.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
            opentelemetry: None,
        }
    }
}

fn default_dns_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv6Addr::UNSPECIFIED, 1053))
}

fn default_api_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv6Addr::UNSPECIFIED, 8053))
}

fn default_serial_refresh_interval() -> u64 {
    3600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "ember-dns".to_string()
}
