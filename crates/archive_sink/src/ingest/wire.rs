use common::domain::{
    DomainError, DomainResult, FLIGHT_FIELD, LISTENER_METADATA_FIELD, Listener, Message,
    MessageKind, MessagePayload, ParsedTelemetry, RAW_FIELD, RawTelemetry,
};
use serde::Deserialize;
use serde_json::{Map, Number, Value};

/// Field of a RECEIVED_TELEM `data` object holding the base64 payload
pub const RECEIVED_PAYLOAD_FIELD: &str = "string";

/// One line of a message log as it arrives on the wire
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub callsign: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
    pub time_created: Number,
    #[serde(default)]
    pub time_uploaded: Option<Number>,
}

/// Parse a wire type tag
pub fn parse_message_kind(tag: &str) -> DomainResult<MessageKind> {
    match tag {
        "RECEIVED_TELEM" => Ok(MessageKind::RawTelemetry),
        "TELEM" => Ok(MessageKind::ParsedTelemetry),
        "LISTENER_INFO" => Ok(MessageKind::ListenerInfo),
        "LISTENER_TELEM" => Ok(MessageKind::ListenerTelem),
        other => Err(DomainError::MalformedMessage(format!(
            "unknown message type '{other}'"
        ))),
    }
}

/// Decode one JSON line. `received_at` stamps messages without an upload time.
pub fn decode_wire_line(line: &str, received_at: i64) -> DomainResult<Message> {
    let wire: WireMessage = serde_json::from_str(line)
        .map_err(|e| DomainError::MalformedMessage(format!("invalid wire message: {e}")))?;
    wire_message_to_domain(wire, received_at)
}

/// Convert a wire message to a domain Message
pub fn wire_message_to_domain(wire: WireMessage, received_at: i64) -> DomainResult<Message> {
    let kind = parse_message_kind(&wire.kind)?;

    let Value::Object(mut data) = wire.data else {
        return Err(DomainError::MalformedMessage(format!(
            "{kind} data must be an object"
        )));
    };

    let payload = match kind {
        MessageKind::RawTelemetry => {
            let raw = take_string(&mut data, RECEIVED_PAYLOAD_FIELD)?.ok_or_else(|| {
                DomainError::MalformedMessage(format!(
                    "{kind} is missing data.{RECEIVED_PAYLOAD_FIELD}"
                ))
            })?;
            MessagePayload::RawTelemetry(RawTelemetry {
                raw,
                metadata: data,
            })
        }
        MessageKind::ParsedTelemetry => {
            let raw = take_string(&mut data, RAW_FIELD)?.ok_or_else(|| {
                DomainError::MalformedMessage(format!("{kind} is missing data.{RAW_FIELD}"))
            })?;
            let listener_metadata = match data.remove(LISTENER_METADATA_FIELD) {
                None | Some(Value::Null) => Map::new(),
                Some(Value::Object(map)) => map,
                Some(_) => {
                    return Err(DomainError::MalformedMessage(format!(
                        "data.{LISTENER_METADATA_FIELD} must be an object"
                    )));
                }
            };
            let flight = take_string(&mut data, FLIGHT_FIELD)?;
            MessagePayload::ParsedTelemetry(ParsedTelemetry {
                raw,
                fields: data,
                listener_metadata,
                flight,
            })
        }
        MessageKind::ListenerInfo => MessagePayload::ListenerInfo(data),
        MessageKind::ListenerTelem => MessagePayload::ListenerTelem(data),
    };

    let time_created = wire_time("time_created", &wire.time_created)?;
    let time_uploaded = match &wire.time_uploaded {
        Some(n) => wire_time("time_uploaded", n)?,
        None => received_at,
    };

    Ok(Message {
        source: Listener {
            callsign: wire.callsign,
            address: wire.ip,
        },
        payload,
        time_created,
        time_uploaded,
    })
}

fn take_string(data: &mut Map<String, Value>, field: &str) -> DomainResult<Option<String>> {
    match data.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(DomainError::MalformedMessage(format!(
            "data.{field} must be a string"
        ))),
    }
}

/// Integer seconds, with fractional parts truncated toward zero
fn wire_time(field: &str, n: &Number) -> DomainResult<i64> {
    if let Some(secs) = n.as_i64() {
        return Ok(secs);
    }
    match n.as_f64() {
        Some(secs) if secs.is_finite() && secs.abs() < i64::MAX as f64 => Ok(secs.trunc() as i64),
        _ => Err(DomainError::MalformedMessage(format!(
            "{field} is out of range: {n}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_decode_received_telem() {
        let line = r#"{"callsign":"habitat","ip":"1.2.3.4","type":"RECEIVED_TELEM","data":{"string":"dGVzdCBtZXNzYWdl","frequency":434075000},"time_created":1234567890,"time_uploaded":1234567895}"#;
        let message = decode_wire_line(line, NOW).unwrap();

        assert_eq!(message.callsign(), "habitat");
        assert_eq!(message.source.address.as_deref(), Some("1.2.3.4"));
        assert_eq!(message.time_created, 1234567890);
        assert_eq!(message.time_uploaded, 1234567895);
        match message.payload {
            MessagePayload::RawTelemetry(raw) => {
                assert_eq!(raw.raw, "dGVzdCBtZXNzYWdl");
                assert_eq!(raw.metadata.get("frequency"), Some(&json!(434075000)));
                assert!(!raw.metadata.contains_key("string"));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_decode_telem_lifts_reserved_fields() {
        let line = r#"{"callsign":"habitat","type":"TELEM","data":{"_raw":"dGVzdCBtZXNzYWdl","_listener_metadata":{"rig":"ft-817"},"_flight":"flight-1","altitude":12000},"time_created":10,"time_uploaded":11}"#;
        let message = decode_wire_line(line, NOW).unwrap();

        assert_eq!(message.flight(), Some("flight-1"));
        match message.payload {
            MessagePayload::ParsedTelemetry(parsed) => {
                assert_eq!(parsed.raw, "dGVzdCBtZXNzYWdl");
                assert_eq!(parsed.listener_metadata.get("rig"), Some(&json!("ft-817")));
                assert_eq!(parsed.fields.len(), 1);
                assert_eq!(parsed.fields.get("altitude"), Some(&json!(12000)));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_decode_listener_messages_keep_data() {
        let info = decode_wire_line(
            r#"{"callsign":"habitat","type":"LISTENER_INFO","data":{"name":"Adam"},"time_created":10,"time_uploaded":11}"#,
            NOW,
        )
        .unwrap();
        assert_eq!(info.kind(), MessageKind::ListenerInfo);

        let telem = decode_wire_line(
            r#"{"callsign":"habitat","type":"LISTENER_TELEM","data":{"latitude":52.0},"time_created":10,"time_uploaded":11}"#,
            NOW,
        )
        .unwrap();
        match telem.payload {
            MessagePayload::ListenerTelem(data) => {
                assert_eq!(data.get("latitude"), Some(&json!(52.0)))
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_float_times_truncate_and_missing_upload_is_stamped() {
        let message = decode_wire_line(
            r#"{"callsign":"habitat","type":"LISTENER_TELEM","data":{},"time_created":1234567890.9}"#,
            NOW,
        )
        .unwrap();

        assert_eq!(message.time_created, 1234567890);
        assert_eq!(message.time_uploaded, NOW);

        let negative = decode_wire_line(
            r#"{"callsign":"habitat","type":"LISTENER_TELEM","data":{},"time_created":-1.5,"time_uploaded":2}"#,
            NOW,
        )
        .unwrap();
        assert_eq!(negative.time_created, -1);
    }

    #[test]
    fn test_malformed_lines_are_rejected() {
        let cases = [
            "not json",
            r#"{"type":"TELEM","data":{"_raw":"aGk="},"time_created":1}"#,
            r#"{"callsign":"a","type":"BOGUS","data":{},"time_created":1}"#,
            r#"{"callsign":"a","type":"LISTENER_INFO","data":[1,2],"time_created":1}"#,
            r#"{"callsign":"a","type":"TELEM","data":{"altitude":1},"time_created":1}"#,
            r#"{"callsign":"a","type":"TELEM","data":{"_raw":"aGk=","_flight":7},"time_created":1}"#,
            r#"{"callsign":"a","type":"RECEIVED_TELEM","data":{"string":5},"time_created":1}"#,
            r#"{"callsign":"a","type":"TELEM","data":{"_raw":"aGk=","_listener_metadata":"x"},"time_created":1}"#,
            r#"{"callsign":"a","type":"LISTENER_TELEM","data":{},"time_created":18446744073709551615}"#,
        ];

        for line in cases {
            let result = decode_wire_line(line, NOW);
            assert!(
                matches!(result, Err(DomainError::MalformedMessage(_))),
                "expected rejection for {line}"
            );
        }
    }

    #[test]
    fn test_parse_message_kind_round_trips_display() {
        for kind in [
            MessageKind::RawTelemetry,
            MessageKind::ParsedTelemetry,
            MessageKind::ListenerInfo,
            MessageKind::ListenerTelem,
        ] {
            assert_eq!(parse_message_kind(kind.as_str()).unwrap(), kind);
        }
    }
}
