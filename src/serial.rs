//! SOA serial arithmetic.
//!
//! Serials live in the RFC1982 sequence space: comparison is modular, and
//! a serial derived from wall-clock time must only be applied when it is
//! "greater" in that space than the serial a zone already carries.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds per serial tick. Dividing wall-clock millis by this yields
/// roughly two serial increments per 30-second window, comfortably ahead of
/// any plausible mutation rate.
const SERIAL_TICK_MS: u64 = 15;

/// Next serial after `current`: increments modulo 2^32 but never yields 0,
/// which RFC2136 reserves.
pub fn next_serial(current: u32) -> u32 {
    match current.wrapping_add(1) {
        0 => 1,
        n => n,
    }
}

/// Time-derived serial for the current instant, always in `1..=u32::MAX`.
pub fn time_serial() -> u32 {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    time_serial_from_millis(now_ms)
}

fn time_serial_from_millis(now_ms: u64) -> u32 {
    ((now_ms / SERIAL_TICK_MS) % (u32::MAX as u64) + 1) as u32
}

/// RFC1982 "greater than" over serial space.
///
/// Pairs exactly 2^31 apart are incomparable and compare false in both
/// directions, so callers skip the update and retry on a later tick.
pub fn serial_gt(a: u32, b: u32) -> bool {
    (a > b && a - b < 1 << 31) || (a < b && b - a > 1 << 31)
}
