//! Request envelope
//!
//! The same JSON envelope travels over the Unix socket (inside a frame),
//! as the HTTP request body, and from this node to its upstream.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Operation requested by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestType {
    Get,
    List,
    Update,
    Subscribe,
    /// Anything else; answered with "unknown type"
    #[serde(other)]
    Unknown,
}

/// Request envelope.
///
/// # Fields
/// - `type`: one of `GET`, `LIST`, `UPDATE`, `SUBSCRIBE`
/// - `keys`: keys to read (GET only)
/// - `items`: key to value, `""` or `null` meaning delete (UPDATE only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "type")]
    pub kind: RequestType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub items: BTreeMap<String, Box<RawValue>>,
}

impl Request {
    /// Builds a GET envelope for the given keys.
    pub fn get<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            kind: RequestType::Get,
            keys: keys.into_iter().map(Into::into).collect(),
            items: BTreeMap::new(),
        }
    }

    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        let empty_key = match self.kind {
            RequestType::Get => self.keys.iter().any(String::is_empty),
            RequestType::Update => self.items.keys().any(String::is_empty),
            _ => false,
        };
        empty_key.then(|| "key cannot be empty".to_string())
    }
}

/// Whether an UPDATE value is the delete marker (`""` or `null`).
pub fn is_delete_marker(value: &RawValue) -> bool {
    matches!(value.get().trim(), "" | "\"\"" | "null")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_request_deserialize() {
        let json = r#"{"type": "GET", "keys": ["foo", "hello"]}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert_eq!(req.kind, RequestType::Get);
        assert_eq!(req.keys, vec!["foo", "hello"]);
        assert!(req.items.is_empty());
    }

    #[test]
    fn test_update_request_keeps_raw_values() {
        let json = r#"{"type":"UPDATE","items":{"foo":{"bar":123},"hello":"world"}}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert_eq!(req.kind, RequestType::Update);
        assert_eq!(req.items["foo"].get(), r#"{"bar":123}"#);
        assert_eq!(req.items["hello"].get(), r#""world""#);
    }

    #[test]
    fn test_unknown_type() {
        let req: Request = serde_json::from_str(r#"{"type":"FLUSH"}"#).unwrap();
        assert_eq!(req.kind, RequestType::Unknown);
    }

    #[test]
    fn test_missing_type_is_an_error() {
        assert!(serde_json::from_str::<Request>(r#"{"keys":["a"]}"#).is_err());
    }

    #[test]
    fn test_get_builder_serializes_without_items() {
        let json = serde_json::to_string(&Request::get(["k"])).unwrap();
        assert_eq!(json, r#"{"type":"GET","keys":["k"]}"#);
    }

    #[test]
    fn test_validate_empty_key() {
        let req = Request::get([""]);
        assert!(req.validate().is_some());

        let req: Request = serde_json::from_str(r#"{"type":"UPDATE","items":{"":1}}"#).unwrap();
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_valid_request() {
        assert!(Request::get(["valid_key"]).validate().is_none());
    }

    #[test]
    fn test_delete_markers() {
        let req: Request =
            serde_json::from_str(r#"{"type":"UPDATE","items":{"a":"","b":null,"c":0,"d":" "}}"#)
                .unwrap();
        assert!(is_delete_marker(&req.items["a"]));
        assert!(is_delete_marker(&req.items["b"]));
        assert!(!is_delete_marker(&req.items["c"]));
        assert!(!is_delete_marker(&req.items["d"]));
    }
}
