use base64::{Engine, engine::general_purpose::STANDARD};
use garde::Validate;
use serde_json::{Map, Value};

/// Parsed-telemetry field holding the raw payload reference
pub const RAW_FIELD: &str = "_raw";
/// Parsed-telemetry field holding per-listener metadata
pub const LISTENER_METADATA_FIELD: &str = "_listener_metadata";
/// Parsed-telemetry field holding the flight tag
pub const FLIGHT_FIELD: &str = "_flight";

/// Control fields that are consumed by the sink and never merged as telemetry
pub const RESERVED_FIELDS: [&str; 3] = [RAW_FIELD, LISTENER_METADATA_FIELD, FLIGHT_FIELD];

/// The ground station that submitted a message
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct Listener {
    #[garde(length(min = 1))]
    pub callsign: String,
    #[garde(skip)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    RawTelemetry,
    ParsedTelemetry,
    ListenerInfo,
    ListenerTelem,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RawTelemetry => "RECEIVED_TELEM",
            Self::ParsedTelemetry => "TELEM",
            Self::ListenerInfo => "LISTENER_INFO",
            Self::ListenerTelem => "LISTENER_TELEM",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw payload as heard on the air, before any decoding
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct RawTelemetry {
    /// Base64 text of the received bytes
    #[garde(length(min = 1), custom(is_base64))]
    pub raw: String,
    /// Opaque per-listener reception details (signal strength, frequency...)
    #[garde(skip)]
    pub metadata: Map<String, Value>,
}

/// A payload that a listener has already decoded into telemetry fields
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct ParsedTelemetry {
    #[garde(length(min = 1), custom(is_base64))]
    pub raw: String,
    #[garde(skip)]
    pub fields: Map<String, Value>,
    #[garde(skip)]
    pub listener_metadata: Map<String, Value>,
    #[garde(length(min = 1))]
    pub flight: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessagePayload {
    RawTelemetry(RawTelemetry),
    ParsedTelemetry(ParsedTelemetry),
    /// Station description (name, antenna, radio...)
    ListenerInfo(Map<String, Value>),
    /// Station position report
    ListenerTelem(Map<String, Value>),
}

/// One report submitted by a listener. Times are unix seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub source: Listener,
    pub payload: MessagePayload,
    pub time_created: i64,
    pub time_uploaded: i64,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self.payload {
            MessagePayload::RawTelemetry(_) => MessageKind::RawTelemetry,
            MessagePayload::ParsedTelemetry(_) => MessageKind::ParsedTelemetry,
            MessagePayload::ListenerInfo(_) => MessageKind::ListenerInfo,
            MessagePayload::ListenerTelem(_) => MessageKind::ListenerTelem,
        }
    }

    pub fn callsign(&self) -> &str {
        &self.source.callsign
    }

    /// Base64 text of the raw payload, for telemetry messages
    pub fn raw_payload(&self) -> Option<&str> {
        match &self.payload {
            MessagePayload::RawTelemetry(raw) => Some(&raw.raw),
            MessagePayload::ParsedTelemetry(parsed) => Some(&parsed.raw),
            _ => None,
        }
    }

    /// Flight tag carried by parsed telemetry
    pub fn flight(&self) -> Option<&str> {
        match &self.payload {
            MessagePayload::ParsedTelemetry(parsed) => parsed.flight.as_deref(),
            _ => None,
        }
    }
}

fn is_base64(value: &str, _context: &()) -> garde::Result {
    STANDARD
        .decode(value)
        .map(|_| ())
        .map_err(|e| garde::Error::new(format!("not valid base64: {e}")))
}
