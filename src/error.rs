//! Error types for ember-dns.

use thiserror::Error;

/// Reason a zone registration collides with a zone already in the store.
///
/// Registered zones never nest, so a new zone is refused when it equals,
/// contains, or sits inside an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ZoneConflict {
    /// The zone is already registered.
    #[error("zone is already registered")]
    AlreadyRegistered,
    /// An existing zone is a subdomain of the requested zone.
    #[error("an existing zone lies inside the requested zone")]
    ContainsExisting,
    /// The requested zone is a subdomain of an existing zone.
    #[error("the requested zone lies inside an existing zone")]
    InsideExisting,
}

/// Errors returned by store mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Name failed hostname validation.
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// Zone registration conflicts with an existing zone.
    #[error("cannot register zone {domain:?}: {conflict}")]
    Conflict {
        /// The zone that was being registered.
        domain: String,
        /// How it collides with the existing zones.
        conflict: ZoneConflict,
    },

    /// Host name is not covered by any registered zone.
    #[error("no registered zone covers {0:?}")]
    NotInZone(String),

    /// A record field failed its type-specific validation.
    #[error("invalid {field} value: {value:?}")]
    InvalidField {
        /// Which field was rejected (`a`, `aaaa`, `txt`, `mx`).
        field: &'static str,
        /// The offending value.
        value: String,
    },

    /// TTL beyond 2147483647 milliseconds.
    #[error("ttl out of range: {0}")]
    InvalidTtl(u64),
}

/// Errors that can occur in the DNS server.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The store rejected a mutation
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
