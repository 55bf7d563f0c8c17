use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Everything the archive keeps in the document store, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Document {
    PayloadTelemetry(PayloadTelemetryDocument),
    ListenerInfo(ListenerDocument),
    ListenerTelem(ListenerDocument),
}

impl Document {
    pub fn type_name(&self) -> &'static str {
        match self {
            Document::PayloadTelemetry(_) => "payload_telemetry",
            Document::ListenerInfo(_) => "listener_info",
            Document::ListenerTelem(_) => "listener_telem",
        }
    }

    pub fn as_payload_telemetry(&self) -> Option<&PayloadTelemetryDocument> {
        match self {
            Document::PayloadTelemetry(doc) => Some(doc),
            _ => None,
        }
    }

    /// The listener document, for either listener kind
    pub fn as_listener(&self) -> Option<&ListenerDocument> {
        match self {
            Document::ListenerInfo(doc) | Document::ListenerTelem(doc) => Some(doc),
            Document::PayloadTelemetry(_) => None,
        }
    }
}

/// Canonical record of one unique raw payload, keyed by its content hash
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadTelemetryDocument {
    pub estimated_time_created: i64,
    /// `_raw` plus every parsed field ever merged in
    #[serde(rename = "data")]
    pub content: Map<String, Value>,
    pub receivers: BTreeMap<String, ReceiverRecord>,
}

impl PayloadTelemetryDocument {
    pub fn raw(&self) -> Option<&str> {
        self.content
            .get(crate::domain::RAW_FIELD)
            .and_then(Value::as_str)
    }

    pub fn receiver_times_created(&self) -> Vec<i64> {
        self.receivers.values().map(|r| r.time_created).collect()
    }
}

/// How and when one listener heard a payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiverRecord {
    pub time_created: i64,
    pub time_uploaded: i64,
    #[serde(rename = "latest_info")]
    pub latest_info_ref: Option<String>,
    #[serde(rename = "latest_telem")]
    pub latest_telem_ref: Option<String>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl ReceiverRecord {
    /// Serialized names owned by the record itself; metadata may not reuse them
    pub const FIELD_NAMES: [&'static str; 4] =
        ["time_created", "time_uploaded", "latest_info", "latest_telem"];
}

/// A listener-info or listener-telem snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerDocument {
    pub callsign: String,
    pub data: Map<String, Value>,
    pub time_created: i64,
    pub time_uploaded: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevant_flights: Option<Vec<String>>,
}

impl ListenerDocument {
    pub fn is_relevant_to(&self, flight: &str) -> bool {
        self.relevant_flights
            .as_ref()
            .is_some_and(|flights| flights.iter().any(|f| f == flight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_telemetry_serialized_shape() {
        let mut metadata = Map::new();
        metadata.insert("foo".to_string(), json!(2));

        let mut receivers = BTreeMap::new();
        receivers.insert(
            "habitat_one".to_string(),
            ReceiverRecord {
                time_created: 12345,
                time_uploaded: 54321,
                latest_info_ref: None,
                latest_telem_ref: Some("abcdef".to_string()),
                metadata,
            },
        );

        let mut content = Map::new();
        content.insert("_raw".to_string(), json!("dGVzdCBtZXNzYWdl"));

        let doc = Document::PayloadTelemetry(PayloadTelemetryDocument {
            estimated_time_created: 12345,
            content,
            receivers,
        });

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "payload_telemetry",
                "estimated_time_created": 12345,
                "data": {"_raw": "dGVzdCBtZXNzYWdl"},
                "receivers": {"habitat_one": {
                    "time_created": 12345,
                    "time_uploaded": 54321,
                    "latest_info": null,
                    "latest_telem": "abcdef",
                    "foo": 2
                }}
            })
        );

        let back: Document = serde_json::from_value(value).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_listener_document_omits_missing_relevant_flights() {
        let doc = Document::ListenerTelem(ListenerDocument {
            callsign: "habitat".to_string(),
            data: Map::new(),
            time_created: 1,
            time_uploaded: 2,
            relevant_flights: None,
        });

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["type"], "listener_telem");
        assert!(value.get("relevant_flights").is_none());
    }

    #[test]
    fn test_is_relevant_to() {
        let doc = ListenerDocument {
            callsign: "habitat".to_string(),
            data: Map::new(),
            time_created: 1,
            time_uploaded: 2,
            relevant_flights: Some(vec!["flight-2-dfgh".to_string()]),
        };
        assert!(doc.is_relevant_to("flight-2-dfgh"));
        assert!(!doc.is_relevant_to("flight-1-asdf"));
    }
}
