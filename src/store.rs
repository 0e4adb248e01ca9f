//! In-memory zone and host store with dynamic updates.
//!
//! The store owns three tables behind one coarse lock: registered zones,
//! host records, and the expiry timers armed for hosts with a TTL. Every
//! operation runs atomically under that lock; notifications go out on a
//! broadcast channel so observers never reach into the tables themselves.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hickory_proto::rr::RecordType;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{StoreError, ZoneConflict};
use crate::expiry::ExpirySchedule;
use crate::metrics;
use crate::name;
use crate::serial;

/// Wire TTL in seconds applied to every synthesized answer. Host record
/// TTLs are lifetimes, not cache hints, and never reach the wire.
pub const ANSWER_TTL: u32 = 60;

/// Largest accepted host TTL in milliseconds.
pub const MAX_TTL_MS: u64 = 2_147_483_647;

/// Fixed SOA timing fields, in seconds.
const SOA_REFRESH: i32 = 300;
const SOA_RETRY: i32 = 3;
const SOA_EXPIRE: i32 = 10;
const SOA_MINIMUM: u32 = 10;

/// MX preference for the single mail exchanger a host can carry.
const MX_PREFERENCE: u16 = 1;

/// Capacity of the store event channel.
const EVENT_CAPACITY: usize = 1024;

/// A zone this server is authoritative for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Zone {
    /// Apex name in the case it was registered with, no trailing dot.
    /// Synthesized SOA and NS records carry this form; lookups use the
    /// lowercase table key.
    pub name: String,
    /// Current SOA serial.
    pub serial: u32,
}

/// A host record inside a registered zone. At most one value per type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRecord {
    /// Host name in the case it was last written with, no trailing dot.
    pub name: String,
    /// Canonical apex name of the owning zone.
    pub zone: String,
    /// IPv4 address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a: Option<Ipv4Addr>,
    /// IPv6 address, held in normalized form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aaaa: Option<Ipv6Addr>,
    /// TXT payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txt: Option<String>,
    /// Mail exchanger host name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mx: Option<String>,
    /// Expiry deadline in Unix epoch milliseconds, for records with a TTL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<u64>,
}

/// Read-only snapshot of the full store, sorted by canonical name.
#[derive(Debug, Clone, Serialize)]
pub struct StoreDump {
    /// Registered zones.
    pub zones: Vec<Zone>,
    /// Host records across all zones.
    pub hosts: Vec<HostRecord>,
}

/// Resolver counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LookupStats {
    /// Total resolver calls.
    pub total: u64,
    /// Calls answered non-authoritatively (bad or foreign names).
    pub errors: u64,
}

/// Counters plus table sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Resolver counters.
    pub lookup: LookupStats,
    /// Registered zone count.
    pub zones: usize,
    /// Host record count.
    pub hosts: usize,
}

/// One field of a host update.
///
/// The distinction between an absent field and an explicitly empty one is
/// load-bearing: absent may inherit under merge, empty always clears.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldPatch {
    /// Field not mentioned; merge may inherit the old value.
    #[default]
    Absent,
    /// Field explicitly cleared; wins over merge-inheritance.
    Clear,
    /// Field set to a new value, validated per field.
    Set(String),
}

impl From<Option<String>> for FieldPatch {
    fn from(value: Option<String>) -> Self {
        match value {
            None => FieldPatch::Absent,
            Some(v) if v.is_empty() => FieldPatch::Clear,
            Some(v) => FieldPatch::Set(v),
        }
    }
}

/// Requested changes to a host's fields.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    /// IPv4 address, dotted-quad literal.
    pub a: FieldPatch,
    /// IPv6 address literal.
    pub aaaa: FieldPatch,
    /// TXT payload, any non-empty string.
    pub txt: FieldPatch,
    /// Mail exchanger, a valid host name.
    pub mx: FieldPatch,
}

impl RecordPatch {
    /// Whether any field carries a value to store. Explicit clears do not
    /// count, matching how the gateway decides between set and remove.
    pub fn has_value(&self) -> bool {
        [&self.a, &self.aaaa, &self.txt, &self.mx]
            .into_iter()
            .any(|f| matches!(f, FieldPatch::Set(v) if !v.is_empty()))
    }
}

/// Store change notifications delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A zone was registered.
    ZoneAdded {
        /// Apex name of the new zone.
        zone: String,
    },
    /// A zone and every host under it were dropped.
    ZoneRemoved {
        /// Apex name of the dropped zone.
        zone: String,
    },
    /// A host record was created.
    HostAdded {
        /// Host name.
        name: String,
    },
    /// An existing host record was replaced.
    HostUpdated {
        /// Host name.
        name: String,
    },
    /// A host record was deleted, explicitly or by TTL expiry.
    HostRemoved {
        /// Host name.
        name: String,
    },
    /// Everything was cleared.
    Flushed,
}

impl StoreEvent {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreEvent::ZoneAdded { .. } => "zone_added",
            StoreEvent::ZoneRemoved { .. } => "zone_removed",
            StoreEvent::HostAdded { .. } => "host_added",
            StoreEvent::HostUpdated { .. } => "host_updated",
            StoreEvent::HostRemoved { .. } => "host_removed",
            StoreEvent::Flushed => "flushed",
        }
    }
}

/// Resolver result for one (name, type) question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Authoritative answer with at least one record.
    Answer(Vec<AnswerRecord>),
    /// Authoritative for the name, but no data of the requested type.
    NoData,
    /// The name falls outside every registered zone.
    NotAuthoritative,
}

/// One synthesized answer record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    /// Owner name, lowercase, no trailing dot.
    pub name: String,
    /// Wire TTL in seconds.
    pub ttl: u32,
    /// Typed payload.
    pub data: RecordData,
}

/// Typed payloads the resolver can synthesize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    /// IPv4 address.
    A(Ipv4Addr),
    /// IPv6 address.
    Aaaa(Ipv6Addr),
    /// Single-string TXT payload.
    Txt(String),
    /// Mail exchanger.
    Mx {
        /// Preference, lower wins.
        preference: u16,
        /// Exchanger host name.
        exchange: String,
    },
    /// Start of authority, synthesized at the zone apex only.
    Soa {
        /// Primary name server, the apex itself.
        primary: String,
        /// Administrative contact in RNAME form.
        admin: String,
        /// Current zone serial.
        serial: u32,
        /// Refresh interval, seconds.
        refresh: i32,
        /// Retry interval, seconds.
        retry: i32,
        /// Expire limit, seconds.
        expire: i32,
        /// Negative-caching minimum, seconds.
        minimum: u32,
    },
    /// Authoritative name server, the zone apex itself.
    Ns(String),
}

/// Thread-safe zone and host store.
#[derive(Debug, Clone)]
pub struct ZoneStore {
    inner: Arc<RwLock<StoreInner>>,
    events: broadcast::Sender<StoreEvent>,
}

#[derive(Debug, Default)]
struct StoreInner {
    /// zone name -> Zone
    zones: HashMap<String, Zone>,

    /// host name -> HostRecord
    hosts: HashMap<String, HostRecord>,

    /// Armed expiry timers, keyed by host name. A key is present here only
    /// while the same key is present in `hosts`.
    timers: ExpirySchedule,

    /// Resolver counters; atomics so lookups run under the read lock.
    lookup_total: AtomicU64,
    lookup_errors: AtomicU64,
}

/// Candidate value for one field after validation.
enum Applied<T> {
    Absent,
    Clear,
    Set(T),
}

impl Default for ZoneStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            events,
        }
    }

    /// Subscribe to store change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Register a zone. Fails if the name is invalid or if it equals,
    /// contains, or sits inside a zone already registered.
    pub fn add_zone(&self, domain: &str) -> Result<(), StoreError> {
        let zone = domain.to_ascii_lowercase();
        if !name::valid_zone(&zone) {
            return Err(StoreError::InvalidName(domain.to_string()));
        }

        let mut inner = self.inner.write();
        for existing in inner.zones.keys() {
            let conflict = if *existing == zone {
                ZoneConflict::AlreadyRegistered
            } else if is_subdomain(existing, &zone) {
                ZoneConflict::ContainsExisting
            } else if is_subdomain(&zone, existing) {
                ZoneConflict::InsideExisting
            } else {
                continue;
            };
            return Err(StoreError::Conflict {
                domain: zone,
                conflict,
            });
        }

        let serial = serial::time_serial();
        debug!(zone = %zone, serial, "registered zone");
        inner.zones.insert(
            zone.clone(),
            Zone {
                name: domain.to_string(),
                serial,
            },
        );
        metrics::record_zone_serial(&zone, serial);
        self.emit(StoreEvent::ZoneAdded { zone });
        Ok(())
    }

    /// Drop a zone and every host it owns. Returns false if the zone was
    /// not registered.
    pub fn remove_zone(&self, domain: &str) -> bool {
        let zone = domain.to_ascii_lowercase();
        let mut inner = self.inner.write();
        if inner.zones.remove(&zone).is_none() {
            return false;
        }

        let doomed: Vec<String> = inner
            .hosts
            .iter()
            .filter(|(_, h)| h.zone == zone)
            .map(|(key, _)| key.clone())
            .collect();
        for host in &doomed {
            inner.timers.cancel(host);
            inner.hosts.remove(host);
        }

        debug!(zone = %zone, hosts = doomed.len(), "removed zone");
        self.emit(StoreEvent::ZoneRemoved { zone });
        true
    }

    /// Canonical apex of the zone containing `name`, if any. The apex
    /// itself counts, so a host record may live directly at a zone's own
    /// name.
    pub fn lookup_owner_zone(&self, name: &str) -> Option<String> {
        let key = name.to_ascii_lowercase();
        let inner = self.inner.read();
        owner_zone(&inner, &key).map(str::to_string)
    }

    /// Create or replace the record at `host`.
    ///
    /// Fields validate before any state changes: `a` as an IPv4 literal,
    /// `aaaa` as an IPv6 literal, `txt` as any non-empty string, `mx` as a
    /// host name. `ttl_ms` may not exceed 2147483647; zero and `None` both
    /// leave the record permanent. Arming the timer needs a Tokio runtime.
    /// Under `merge`, fields the patch leaves absent inherit the previous
    /// record's value; explicit clears always win.
    pub fn set_host(
        &self,
        host: &str,
        patch: RecordPatch,
        ttl_ms: Option<u64>,
        merge: bool,
    ) -> Result<(), StoreError> {
        let key = host.to_ascii_lowercase();
        if !name::valid_name(&key) {
            return Err(StoreError::InvalidName(host.to_string()));
        }
        // Zero and absent both mean no expiry.
        let ttl_ms = match ttl_ms {
            Some(ttl) if ttl > MAX_TTL_MS => return Err(StoreError::InvalidTtl(ttl)),
            Some(0) | None => None,
            Some(ttl) => Some(ttl),
        };

        let a = parse_field(&patch.a, "a", |v| v.parse::<Ipv4Addr>().ok())?;
        let aaaa = parse_field(&patch.aaaa, "aaaa", |v| v.parse::<Ipv6Addr>().ok())?;
        let txt = parse_field(&patch.txt, "txt", |v| Some(v.to_string()))?;
        let mx = parse_field(&patch.mx, "mx", |v| {
            name::valid_name(v).then(|| v.to_ascii_lowercase())
        })?;

        let mut inner = self.inner.write();
        let Some(zone) = owner_zone(&inner, &key).map(str::to_string) else {
            return Err(StoreError::NotInZone(key));
        };

        // The old timer must die before the new record becomes visible.
        inner.timers.cancel(&key);
        let previous = inner.hosts.get(&key).cloned();

        let record = HostRecord {
            name: host.to_string(),
            zone,
            a: applied(a, previous.as_ref().and_then(|p| p.a), merge),
            aaaa: applied(aaaa, previous.as_ref().and_then(|p| p.aaaa), merge),
            txt: applied(txt, previous.as_ref().and_then(|p| p.txt.clone()), merge),
            mx: applied(mx, previous.as_ref().and_then(|p| p.mx.clone()), merge),
            expires_at_ms: ttl_ms.map(|ttl| epoch_ms() + ttl),
        };

        debug!(
            host = %key,
            zone = %record.zone,
            ttl_ms,
            merge,
            update = previous.is_some(),
            "stored host record"
        );

        bump_serial(&mut inner, &record.zone);
        inner.hosts.insert(key.clone(), record);

        if let Some(ttl) = ttl_ms {
            let generation = inner.timers.next_generation();
            let store = self.clone();
            let timer_key = key.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(ttl)).await;
                store.expire(&timer_key, generation);
            });
            inner.timers.arm(key.clone(), generation, handle);
        }

        let event = if previous.is_some() {
            StoreEvent::HostUpdated { name: key }
        } else {
            StoreEvent::HostAdded { name: key }
        };
        self.emit(event);
        Ok(())
    }

    /// Delete the record at `host`. Returns false if absent.
    pub fn remove_host(&self, host: &str) -> bool {
        let key = host.to_ascii_lowercase();
        let mut inner = self.inner.write();
        let Some(record) = inner.hosts.remove(&key) else {
            return false;
        };
        inner.timers.cancel(&key);
        bump_serial(&mut inner, &record.zone);
        debug!(host = %key, zone = %record.zone, "removed host record");
        self.emit(StoreEvent::HostRemoved { name: key });
        true
    }

    /// Answer one question.
    ///
    /// Always counts the call; counts an error only when the outcome is
    /// [`LookupOutcome::NotAuthoritative`]. A single trailing dot on
    /// `qname` is accepted and ignored.
    pub fn resolve(&self, qname: &str, rtype: RecordType) -> LookupOutcome {
        let inner = self.inner.read();
        inner.lookup_total.fetch_add(1, Ordering::Relaxed);

        let name = qname
            .strip_suffix('.')
            .unwrap_or(qname)
            .to_ascii_lowercase();
        if !name::valid_name(&name) {
            inner.lookup_errors.fetch_add(1, Ordering::Relaxed);
            return LookupOutcome::NotAuthoritative;
        }

        let apex = inner.zones.get(&name);
        let host = inner.hosts.get(&name);
        let in_context = apex.is_some() || host.is_some() || owner_zone(&inner, &name).is_some();
        if !in_context {
            inner.lookup_errors.fetch_add(1, Ordering::Relaxed);
            return LookupOutcome::NotAuthoritative;
        }

        let single = |data: RecordData| AnswerRecord {
            name: name.clone(),
            ttl: ANSWER_TTL,
            data,
        };

        let answer = match rtype {
            RecordType::SOA => apex.map(|zone| {
                single(RecordData::Soa {
                    primary: zone.name.clone(),
                    admin: format!("postmaster.{}", zone.name),
                    serial: zone.serial,
                    refresh: SOA_REFRESH,
                    retry: SOA_RETRY,
                    expire: SOA_EXPIRE,
                    minimum: SOA_MINIMUM,
                })
            }),
            RecordType::NS => apex.map(|zone| single(RecordData::Ns(zone.name.clone()))),
            RecordType::A => host
                .and_then(|h| h.a)
                .map(|addr| single(RecordData::A(addr))),
            RecordType::AAAA => host
                .and_then(|h| h.aaaa)
                .map(|addr| single(RecordData::Aaaa(addr))),
            RecordType::TXT => host
                .and_then(|h| h.txt.clone())
                .map(|payload| single(RecordData::Txt(payload))),
            RecordType::MX => host.and_then(|h| h.mx.clone()).map(|exchange| {
                single(RecordData::Mx {
                    preference: MX_PREFERENCE,
                    exchange,
                })
            }),
            // No data is ever stored for other types: in-context queries
            // for them are authoritative no-data answers.
            _ => None,
        };

        match answer {
            Some(record) => LookupOutcome::Answer(vec![record]),
            None => LookupOutcome::NoData,
        }
    }

    /// Apply the wall-clock serial to every zone it is ahead of. Returns
    /// how many zones moved.
    pub fn refresh_serials(&self) -> usize {
        let target = serial::time_serial();
        let mut inner = self.inner.write();
        let mut updated = 0;
        for (name, zone) in inner.zones.iter_mut() {
            if serial::serial_gt(target, zone.serial) {
                zone.serial = target;
                metrics::record_zone_serial(name, zone.serial);
                updated += 1;
            }
        }
        if updated > 0 {
            debug!(zones = updated, serial = target, "refreshed zone serials");
        }
        updated
    }

    /// Drop everything: zones, hosts, timers, counters.
    pub fn flush(&self) {
        let mut inner = self.inner.write();
        inner.timers.cancel_all();
        inner.zones.clear();
        inner.hosts.clear();
        inner.lookup_total.store(0, Ordering::Relaxed);
        inner.lookup_errors.store(0, Ordering::Relaxed);
        debug!("flushed all zones and hosts");
        self.emit(StoreEvent::Flushed);
    }

    /// Snapshot every zone and host. Timer internals are not part of the
    /// snapshot.
    pub fn dump(&self) -> StoreDump {
        let inner = self.inner.read();
        let mut zones: Vec<Zone> = inner.zones.values().cloned().collect();
        zones.sort_by_key(|z| z.name.to_ascii_lowercase());
        let mut hosts: Vec<HostRecord> = inner.hosts.values().cloned().collect();
        hosts.sort_by_key(|h| h.name.to_ascii_lowercase());
        StoreDump { zones, hosts }
    }

    /// Current counters and table sizes.
    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read();
        StoreStats {
            lookup: LookupStats {
                total: inner.lookup_total.load(Ordering::Relaxed),
                errors: inner.lookup_errors.load(Ordering::Relaxed),
            },
            zones: inner.zones.len(),
            hosts: inner.hosts.len(),
        }
    }

    /// Get count of zones (for health check).
    pub fn zones_count(&self) -> usize {
        self.inner.read().zones.len()
    }

    /// Get count of host records (for health check).
    pub fn hosts_count(&self) -> usize {
        self.inner.read().hosts.len()
    }

    /// Emit current state gauges.
    pub fn emit_metrics(&self) {
        let inner = self.inner.read();
        metrics::record_store_counts(inner.zones.len(), inner.hosts.len(), inner.timers.len());
    }

    /// Timer callback: remove `key` if `generation` still owns it.
    fn expire(&self, key: &str, generation: u64) {
        let mut inner = self.inner.write();
        if !inner.timers.complete(key, generation) {
            // Superseded by a later set or an explicit remove.
            return;
        }
        let Some(record) = inner.hosts.remove(key) else {
            return;
        };
        bump_serial(&mut inner, &record.zone);
        debug!(host = %key, zone = %record.zone, "host record expired");
        metrics::record_expiry();
        self.emit(StoreEvent::HostRemoved {
            name: key.to_string(),
        });
    }

    fn emit(&self, event: StoreEvent) {
        metrics::record_store_event(event.kind());
        // A send error only means nobody is subscribed right now.
        let _ = self.events.send(event);
    }
}

/// Whether `name` sits strictly below `zone` in the DNS tree.
fn is_subdomain(name: &str, zone: &str) -> bool {
    name.strip_suffix(zone)
        .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Find the zone containing `name` by checking every dot-suffix, shortest
/// first, then the full name. Zones never nest, so the first hit is the
/// only possible one.
fn owner_zone<'n>(inner: &StoreInner, name: &'n str) -> Option<&'n str> {
    let mut start = name.len();
    while let Some(dot) = name[..start].rfind('.') {
        let suffix = &name[dot + 1..];
        if inner.zones.contains_key(suffix) {
            return Some(suffix);
        }
        start = dot;
    }
    inner.zones.contains_key(name).then_some(name)
}

fn bump_serial(inner: &mut StoreInner, zone: &str) {
    if let Some(entry) = inner.zones.get_mut(zone) {
        entry.serial = serial::next_serial(entry.serial);
        metrics::record_zone_serial(zone, entry.serial);
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Validate one patch field. An empty value is an explicit clear no matter
/// how it was spelled.
fn parse_field<T>(
    patch: &FieldPatch,
    field: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Applied<T>, StoreError> {
    match patch {
        FieldPatch::Absent => Ok(Applied::Absent),
        FieldPatch::Clear => Ok(Applied::Clear),
        FieldPatch::Set(value) if value.is_empty() => Ok(Applied::Clear),
        FieldPatch::Set(value) => match parse(value) {
            Some(parsed) => Ok(Applied::Set(parsed)),
            None => Err(StoreError::InvalidField {
                field,
                value: value.clone(),
            }),
        },
    }
}

/// Final value for one field: set wins, clear empties, absent inherits the
/// old value only under merge.
fn applied<T>(parsed: Applied<T>, old: Option<T>, merge: bool) -> Option<T> {
    match parsed {
        Applied::Set(v) => Some(v),
        Applied::Clear => None,
        Applied::Absent if merge => old,
        Applied::Absent => None,
    }
}
