//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Which storage adapter backs the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Embedded redb database at `db_path`
    Redb,
    /// Process-local ordered map; contents are lost on exit
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redb" => Ok(Self::Redb),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream authority URL; `None` runs the node as the authority of record
    pub upstream_url: Option<String>,
    /// TTL applied to every write; zero means entries never expire
    pub cache_ttl: Duration,
    /// Interval between janitor sweeps
    pub janitor_interval: Duration,
    /// Maximum number of deletes per janitor write batch
    pub janitor_chunk: usize,
    /// Timeout for a single upstream fetch
    pub upstream_timeout: Duration,
    /// Storage adapter selection
    pub storage_backend: StorageBackend,
    /// Path of the redb database file
    pub db_path: PathBuf,
    /// Path of the Unix socket
    pub socket_path: PathBuf,
    /// HTTP server port
    pub server_port: u16,
    /// Whether SUBSCRIBE and change notifications are enabled
    pub enable_notifications: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `UPSTREAM_URL` - Upstream authority (default: unset, authority mode)
    /// - `CACHE_TTL` - Entry TTL, e.g. `30s`, `5m` or plain seconds (default: 0 = infinite)
    /// - `JANITOR_INTERVAL` - Sweep interval (default: 60s)
    /// - `JANITOR_CHUNK` - Deletes per batch (default: 1000)
    /// - `UPSTREAM_TIMEOUT` - Upstream call timeout (default: 5s)
    /// - `STORAGE_BACKEND` - `redb` or `memory` (default: redb)
    /// - `DB_PATH` - Database file (default: ./kvdb.redb)
    /// - `SOCKET_PATH` - Unix socket path (default: /tmp/kvstore.sock)
    /// - `SERVER_PORT` - HTTP server port (default: 8080)
    /// - `ENABLE_NOTIFICATIONS` - Enable the notification bus (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable lookup.
    ///
    /// Unset or blank variables fall back to their defaults; values that
    /// are present but unparsable are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let janitor_chunk = match get("JANITOR_CHUNK") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(0) => return Err(invalid("JANITOR_CHUNK", "must be greater than zero")),
                Ok(n) => n,
                Err(e) => return Err(invalid("JANITOR_CHUNK", e)),
            },
            None => defaults.janitor_chunk,
        };

        let janitor_interval = match get("JANITOR_INTERVAL") {
            Some(raw) => match parse_duration(&raw) {
                Ok(d) if d.is_zero() => {
                    return Err(invalid("JANITOR_INTERVAL", "must be greater than zero"))
                }
                Ok(d) => d,
                Err(e) => return Err(invalid("JANITOR_INTERVAL", e)),
            },
            None => defaults.janitor_interval,
        };

        Ok(Self {
            upstream_url: get("UPSTREAM_URL"),
            cache_ttl: get("CACHE_TTL")
                .map(|raw| parse_duration(&raw).map_err(|e| invalid("CACHE_TTL", e)))
                .transpose()?
                .unwrap_or(defaults.cache_ttl),
            janitor_interval,
            janitor_chunk,
            upstream_timeout: get("UPSTREAM_TIMEOUT")
                .map(|raw| parse_duration(&raw).map_err(|e| invalid("UPSTREAM_TIMEOUT", e)))
                .transpose()?
                .unwrap_or(defaults.upstream_timeout),
            storage_backend: get("STORAGE_BACKEND")
                .map(|raw| raw.parse::<StorageBackend>().map_err(|e| invalid("STORAGE_BACKEND", e)))
                .transpose()?
                .unwrap_or(defaults.storage_backend),
            db_path: get("DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path),
            socket_path: get("SOCKET_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.socket_path),
            server_port: get("SERVER_PORT")
                .map(|raw| raw.parse::<u16>().map_err(|e| invalid("SERVER_PORT", e)))
                .transpose()?
                .unwrap_or(defaults.server_port),
            enable_notifications: get("ENABLE_NOTIFICATIONS")
                .map(|raw| parse_bool(&raw).ok_or_else(|| invalid("ENABLE_NOTIFICATIONS", raw)))
                .transpose()?
                .unwrap_or(defaults.enable_notifications),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream_url: None,
            cache_ttl: Duration::ZERO,
            janitor_interval: Duration::from_secs(60),
            janitor_chunk: 1000,
            upstream_timeout: Duration::from_secs(5),
            storage_backend: StorageBackend::Redb,
            db_path: PathBuf::from("./kvdb.redb"),
            socket_path: PathBuf::from("/tmp/kvstore.sock"),
            server_port: 8080,
            enable_notifications: false,
        }
    }
}

// == Parsing Helpers ==
/// Parses `"0"`, plain seconds (`"30"`) or humantime strings (`"1m 30s"`).
fn parse_duration(raw: &str) -> Result<Duration, String> {
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(raw).map_err(|e| e.to_string())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(name: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError {
        name,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.upstream_url.is_none());
        assert_eq!(config.cache_ttl, Duration::ZERO);
        assert_eq!(config.janitor_interval, Duration::from_secs(60));
        assert_eq!(config.janitor_chunk, 1000);
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.storage_backend, StorageBackend::Redb);
        assert!(!config.enable_notifications);
    }

    #[test]
    fn test_config_from_empty_lookup_uses_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert!(config.upstream_url.is_none());
        assert_eq!(config.cache_ttl, Duration::ZERO);
        assert_eq!(config.socket_path, PathBuf::from("/tmp/kvstore.sock"));
    }

    #[test]
    fn test_config_parses_all_variables() {
        let config = Config::from_lookup(lookup(&[
            ("UPSTREAM_URL", "http://authority:8080/"),
            ("CACHE_TTL", "2m"),
            ("JANITOR_INTERVAL", "15s"),
            ("JANITOR_CHUNK", "250"),
            ("UPSTREAM_TIMEOUT", "750ms"),
            ("STORAGE_BACKEND", "memory"),
            ("DB_PATH", "/var/lib/kv/db.redb"),
            ("SOCKET_PATH", "/run/kv.sock"),
            ("SERVER_PORT", "9000"),
            ("ENABLE_NOTIFICATIONS", "true"),
        ]))
        .unwrap();

        assert_eq!(config.upstream_url.as_deref(), Some("http://authority:8080/"));
        assert_eq!(config.cache_ttl, Duration::from_secs(120));
        assert_eq!(config.janitor_interval, Duration::from_secs(15));
        assert_eq!(config.janitor_chunk, 250);
        assert_eq!(config.upstream_timeout, Duration::from_millis(750));
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.db_path, PathBuf::from("/var/lib/kv/db.redb"));
        assert_eq!(config.socket_path, PathBuf::from("/run/kv.sock"));
        assert_eq!(config.server_port, 9000);
        assert!(config.enable_notifications);
    }

    #[test]
    fn test_ttl_zero_and_plain_seconds() {
        let config = Config::from_lookup(lookup(&[("CACHE_TTL", "0")])).unwrap();
        assert!(config.cache_ttl.is_zero());

        let config = Config::from_lookup(lookup(&[("CACHE_TTL", "30")])).unwrap();
        assert_eq!(config.cache_ttl, Duration::from_secs(30));
    }

    #[test]
    fn test_blank_upstream_is_authority_mode() {
        let config = Config::from_lookup(lookup(&[("UPSTREAM_URL", "  ")])).unwrap();
        assert!(config.upstream_url.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = Config::from_lookup(lookup(&[("CACHE_TTL", "soon")])).unwrap_err();
        assert_eq!(err.name, "CACHE_TTL");

        let err = Config::from_lookup(lookup(&[("JANITOR_CHUNK", "0")])).unwrap_err();
        assert_eq!(err.name, "JANITOR_CHUNK");

        let err = Config::from_lookup(lookup(&[("JANITOR_INTERVAL", "0s")])).unwrap_err();
        assert_eq!(err.name, "JANITOR_INTERVAL");

        let err = Config::from_lookup(lookup(&[("STORAGE_BACKEND", "rocks")])).unwrap_err();
        assert_eq!(err.name, "STORAGE_BACKEND");

        let err = Config::from_lookup(lookup(&[("ENABLE_NOTIFICATIONS", "maybe")])).unwrap_err();
        assert_eq!(err.name, "ENABLE_NOTIFICATIONS");
    }
}
