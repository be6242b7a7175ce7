//! Cache Entry Module
//!
//! Wraps a value with its expiry timestamp for persistence.
//!
//! The on-disk form is `{"expiry": <i64 unix nanos>, "value": <raw json>}`.
//! `INFINITE` (`i64::MAX`) marks an entry that never expires, so liveness is
//! decided by a single comparison with no separate "has TTL" flag.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::DecodeError;

/// Expiry stamp of entries that never expire.
pub const INFINITE: i64 = i64::MAX;

// == TTL ==
/// Time-to-live applied to writes. Zero means entries never expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ttl(Duration);

impl Ttl {
    pub const INFINITE: Ttl = Ttl(Duration::ZERO);

    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    pub fn is_infinite(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    // == Expiry From ==
    /// Returns the expiry stamp for an entry written at `now`.
    pub fn expiry_from(&self, now: i64) -> i64 {
        if self.is_infinite() {
            return INFINITE;
        }
        let ttl = i64::try_from(self.0.as_nanos()).unwrap_or(i64::MAX);
        // A finite TTL must never collide with the INFINITE sentinel.
        now.saturating_add(ttl).min(INFINITE - 1)
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            f.write_str("infinite")
        } else {
            write!(f, "{}", humantime::format_duration(self.0))
        }
    }
}

// == Cache Entry ==
/// A decoded, wrapped entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value, byte-exact
    pub value: Box<RawValue>,
    /// Expiry stamp (Unix nanoseconds) or `INFINITE`
    pub expiry: i64,
}

impl CacheEntry {
    /// Checks whether a read at `now` must treat the entry as absent.
    pub fn is_expired_at(&self, now: i64) -> bool {
        is_expired(self.expiry, now)
    }
}

/// Result of decoding stored bytes.
#[derive(Debug, Clone)]
pub enum Decoded {
    /// A value written through this codec
    Entry(CacheEntry),
    /// Valid JSON stored without the expiry wrapper
    Legacy(Box<RawValue>),
}

#[derive(Serialize)]
struct EntryRef<'a> {
    expiry: i64,
    value: &'a RawValue,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredEntry<'a> {
    expiry: i64,
    #[serde(borrow)]
    value: &'a RawValue,
}

// == Encode ==
/// Serializes `value` with the expiry derived from `ttl` and `now`.
pub fn encode(value: &RawValue, ttl: Ttl, now: i64) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&EntryRef {
        expiry: ttl.expiry_from(now),
        value,
    })
}

// == Decode ==
/// Decodes stored bytes into a wrapped entry or a legacy raw value.
///
/// Bytes that are not JSON at all are a `DecodeError`.
pub fn decode(bytes: &[u8]) -> Result<Decoded, DecodeError> {
    if let Ok(stored) = serde_json::from_slice::<StoredEntry<'_>>(bytes) {
        return Ok(Decoded::Entry(CacheEntry {
            value: stored.value.to_owned(),
            expiry: stored.expiry,
        }));
    }
    let raw: Box<RawValue> = serde_json::from_slice(bytes)?;
    Ok(Decoded::Legacy(raw))
}

// == Liveness ==
/// Read-path check: strictly past the expiry stamp.
pub fn is_expired(expiry: i64, now: i64) -> bool {
    expiry != INFINITE && now > expiry
}

/// Janitor check: at or past the expiry stamp.
pub fn is_sweepable(expiry: i64, now: i64) -> bool {
    expiry != INFINITE && expiry <= now
}
