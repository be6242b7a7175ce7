//! Response envelopes
//!
//! Defines the response and notification envelopes plus the bodies of the
//! auxiliary HTTP endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::cache::StatsSnapshot;

/// Key to value, `None` serializing as `null`.
pub type DataMap = BTreeMap<String, Option<Box<RawValue>>>;

/// Outcome marker of a response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseType {
    Ok,
    Err,
}

/// Response envelope: either OK (optionally with data) or ERR with a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "type")]
    pub kind: ResponseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataMap>,
}

impl Response {
    /// Success without data.
    pub fn ok() -> Self {
        Self {
            kind: ResponseType::Ok,
            error: None,
            data: None,
        }
    }

    /// Success carrying a key/value map.
    pub fn with_data(data: DataMap) -> Self {
        Self {
            kind: ResponseType::Ok,
            error: None,
            data: Some(data),
        }
    }

    /// Failure with a message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ResponseType::Err,
            error: Some(message.into()),
            data: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.kind == ResponseType::Ok
    }
}

/// Change notification pushed to subscribed socket connections.
///
/// A deleted key carries `"value": null`.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    #[serde(rename = "type")]
    kind: &'static str,
    pub key: String,
    pub value: Option<Box<RawValue>>,
}

impl Notification {
    pub fn new(key: impl Into<String>, value: Option<Box<RawValue>>) -> Self {
        Self {
            kind: "NOTIFY",
            key: key.into(),
            value,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// `authority` or `cache`
    pub mode: &'static str,
    /// Configured TTL, `infinite` when disabled
    pub ttl: String,
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    pub fn new(mode: &'static str, ttl: String, stats: StatsSnapshot) -> Self {
        let hit_rate = stats.hit_rate();
        Self {
            mode,
            ttl,
            stats,
            hit_rate,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> Box<RawValue> {
        RawValue::from_string(json.to_string()).unwrap()
    }

    #[test]
    fn test_ok_response_serialize() {
        let json = serde_json::to_string(&Response::ok()).unwrap();
        assert_eq!(json, r#"{"type":"OK"}"#);
    }

    #[test]
    fn test_error_response_serialize() {
        let json = serde_json::to_string(&Response::error("unknown type")).unwrap();
        assert_eq!(json, r#"{"type":"ERR","error":"unknown type"}"#);
    }

    #[test]
    fn test_data_response_serialize_keeps_raw_values() {
        let mut data = DataMap::new();
        data.insert("foo".to_string(), Some(raw(r#"{"bar":123}"#)));
        data.insert("missing".to_string(), None);

        let json = serde_json::to_string(&Response::with_data(data)).unwrap();
        assert_eq!(
            json,
            r#"{"type":"OK","data":{"foo":{"bar":123},"missing":null}}"#
        );
    }

    #[test]
    fn test_response_deserialize_null_as_none() {
        let resp: Response =
            serde_json::from_str(r#"{"type":"OK","data":{"k":null,"v":[1,2]}}"#).unwrap();
        let data = resp.data.unwrap();
        assert!(data["k"].is_none());
        assert_eq!(data["v"].as_ref().unwrap().get(), "[1,2]");
    }

    #[test]
    fn test_notification_serialize() {
        let json = serde_json::to_string(&Notification::new("k", Some(raw("7")))).unwrap();
        assert_eq!(json, r#"{"type":"NOTIFY","key":"k","value":7}"#);

        let json = serde_json::to_string(&Notification::new("k", None)).unwrap();
        assert_eq!(json, r#"{"type":"NOTIFY","key":"k","value":null}"#);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
