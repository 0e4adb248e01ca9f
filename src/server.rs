//! DNS server setup and lifecycle management.

use hickory_server::authority::{AuthorityObject, Catalog};
use hickory_server::ServerFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::api_router;
use crate::authority::StoreAuthority;
use crate::config::Config;
use crate::error::DnsError;
use crate::store::ZoneStore;

/// Interval for emitting store metrics.
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Periodically emit store metrics.
async fn metrics_loop(store: ZoneStore, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(METRICS_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                store.emit_metrics();
                debug!(
                    zones = store.zones_count(),
                    hosts = store.hosts_count(),
                    "emitted store metrics"
                );
            }
            _ = shutdown.cancelled() => {
                debug!("metrics loop shutting down");
                return;
            }
        }
    }
}

/// Periodically advance zone serials towards the current time.
///
/// A zero interval disables the task.
async fn serial_loop(store: ZoneStore, interval_secs: u64, shutdown: CancellationToken) {
    if interval_secs == 0 {
        debug!("serial refresh disabled");
        return;
    }

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; zones start current.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let refreshed = store.refresh_serials();
                if refreshed > 0 {
                    debug!(zones = refreshed, "refreshed zone serials");
                }
            }
            _ = shutdown.cancelled() => {
                debug!("serial refresh loop shutting down");
                return;
            }
        }
    }
}

/// Log store events for operators and keep the broadcast channel drained.
async fn event_loop(store: ZoneStore, shutdown: CancellationToken) {
    let mut events = store.subscribe();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => debug!(event = event.kind(), "store event"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "store event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            },
            _ = shutdown.cancelled() => {
                debug!("event loop shutting down");
                return;
            }
        }
    }
}

/// DNS server backed by the in-memory zone store.
pub struct DnsServer {
    config: Config,
    store: ZoneStore,
}

impl DnsServer {
    /// Create a new DNS server with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: ZoneStore::new(),
        }
    }

    /// Get a reference to the zone store.
    pub fn store(&self) -> &ZoneStore {
        &self.store
    }

    /// Run the DNS and API servers until the token is cancelled.
    ///
    /// Cancels the token on exit so sibling tasks stop when either
    /// server dies.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), DnsError> {
        info!(
            dns_addr = %self.config.dns.listen_addr,
            api_addr = %self.config.api.listen_addr,
            "Starting ember-dns server"
        );

        // Create authority and catalog
        let authority = StoreAuthority::new(self.store.clone());

        let mut catalog = Catalog::new();
        let authority: Arc<dyn AuthorityObject> = Arc::new(authority);
        catalog.upsert(authority.origin().clone(), vec![authority]);

        // Create server
        let mut server = ServerFuture::new(catalog);

        // Bind UDP
        let udp_socket = UdpSocket::bind(self.config.dns.listen_addr).await?;
        info!(addr = %self.config.dns.listen_addr, "DNS UDP listening");
        server.register_socket(udp_socket);

        // Bind TCP
        let tcp_listener = TcpListener::bind(self.config.dns.listen_addr).await?;
        info!(addr = %self.config.dns.listen_addr, "DNS TCP listening");
        server.register_listener(tcp_listener, Duration::from_secs(30));

        // Start the update API
        let api_listener = TcpListener::bind(self.config.api.listen_addr).await?;
        info!(addr = %self.config.api.listen_addr, "update API listening");
        let router = api_router().with_state(self.store.clone());
        let api_shutdown = shutdown.clone();
        let api_handle = tokio::spawn(async move {
            let serve = axum::serve(api_listener, router)
                .with_graceful_shutdown(api_shutdown.cancelled_owned());
            if let Err(e) = serve.await {
                error!("API server error: {}", e);
            }
        });

        // Start background loops
        let serial_handle = tokio::spawn(serial_loop(
            self.store.clone(),
            self.config.dns.serial_refresh_interval_secs,
            shutdown.clone(),
        ));
        let metrics_handle = tokio::spawn(metrics_loop(self.store.clone(), shutdown.clone()));
        let events_handle = tokio::spawn(event_loop(self.store.clone(), shutdown.clone()));

        // Emit initial metrics
        self.store.emit_metrics();

        info!("DNS server ready to serve queries");

        // Run server until shutdown
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("DNS server shutdown requested");
            }
            result = server.block_until_done() => {
                if let Err(e) = result {
                    error!("DNS server error: {}", e);
                }
            }
        }

        shutdown.cancel();

        let _ = api_handle.await;
        let _ = serial_handle.await;
        let _ = metrics_handle.await;
        let _ = events_handle.await;

        info!("DNS server stopped");
        Ok(())
    }
}
