//! Ember DNS - An authoritative DNS server with an HTTP update API.
//!
//! This crate provides a small authoritative DNS server whose zones and host
//! records live in process memory and are maintained over a JSON HTTP API.
//! Updates are visible to the next query; there is no persistence and no
//! recursion.
//!
//! ## Features
//!
//! - Dynamic zone and host updates over HTTP, effective immediately
//! - A, AAAA, TXT and MX answers plus synthesized SOA and NS at zone apexes
//! - Millisecond-precision record expiry timers
//! - Time-derived zone serials with RFC 1982 comparison
//! - Graceful shutdown support
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          ember-dns                           │
//! │                                                              │
//! │  HTTP update API ───▶ ┌──────────────────┐                   │
//! │  POST /domain /host   │    Zone store    │                   │
//! │        :8053          │   (in-memory)    │                   │
//! │                       └────────┬─────────┘                   │
//! │                                │                             │
//! │                                ▼                             │
//! │                       ┌──────────────────┐                   │
//! │                       │  Hickory DNS     │◀── UDP/TCP        │
//! │                       │  Server          │    :1053          │
//! │                       └──────────────────┘                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## DNS Resolution
//!
//! ```text
//! www.example.com A?
//!   → walk name suffixes to find the owning zone
//!   → answer from the host record's A field
//!   → no owning zone: NOERROR with zero answers, counted as an error
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use ember_dns::{Config, DnsServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let shutdown = CancellationToken::new();
//!
//!     let server = DnsServer::new(config);
//!     server.run(shutdown).await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod api;
pub mod authority;
pub mod config;
pub mod error;
mod expiry;
pub mod metrics;
pub mod name;
pub mod serial;
pub mod server;
pub mod store;
pub mod telemetry;

// Re-export main types
pub use config::{ApiConfig, Config, DnsConfig, TelemetryConfig};
pub use error::{DnsError, StoreError, ZoneConflict};
pub use server::DnsServer;
pub use store::ZoneStore;
