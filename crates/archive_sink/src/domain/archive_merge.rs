use crate::domain::consensus::estimate_time_created;
use common::domain::{
    DomainError, DomainResult, Message, MessagePayload, PayloadTelemetryDocument, RAW_FIELD,
    RESERVED_FIELDS, ReceiverRecord,
};
use serde_json::{Map, Value};
use tracing::warn;

/// Ids of a listener's most recent status documents, when resolvable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerRefs {
    pub latest_info: Option<String>,
    pub latest_telem: Option<String>,
}

/// Compute the next version of a payload archive document.
///
/// Parsed fields overwrite what is already there (last value wins), `_raw`
/// is always set, and the sender's receiver record is replaced outright.
/// The consensus time is recomputed over all receivers.
pub fn merge_payload_telemetry(
    current: Option<&PayloadTelemetryDocument>,
    message: &Message,
    refs: &ListenerRefs,
    tolerance_secs: i64,
) -> DomainResult<PayloadTelemetryDocument> {
    let mut doc = current.cloned().unwrap_or_default();

    let (raw, metadata) = match &message.payload {
        MessagePayload::RawTelemetry(raw) => (&raw.raw, &raw.metadata),
        MessagePayload::ParsedTelemetry(parsed) => {
            for (field, value) in &parsed.fields {
                if RESERVED_FIELDS.contains(&field.as_str()) {
                    continue;
                }
                doc.content.insert(field.clone(), value.clone());
            }
            (&parsed.raw, &parsed.listener_metadata)
        }
        MessagePayload::ListenerInfo(_) | MessagePayload::ListenerTelem(_) => {
            return Err(DomainError::MalformedMessage(format!(
                "{} is not a telemetry message",
                message.kind()
            )));
        }
    };

    doc.content
        .insert(RAW_FIELD.to_string(), Value::String(raw.clone()));

    doc.receivers.insert(
        message.callsign().to_string(),
        ReceiverRecord {
            time_created: message.time_created,
            time_uploaded: message.time_uploaded,
            latest_info_ref: refs.latest_info.clone(),
            latest_telem_ref: refs.latest_telem.clone(),
            metadata: receiver_metadata(message.callsign(), metadata),
        },
    );

    doc.estimated_time_created =
        estimate_time_created(&doc.receiver_times_created(), tolerance_secs)
            .unwrap_or(message.time_created);

    Ok(doc)
}

fn receiver_metadata(callsign: &str, metadata: &Map<String, Value>) -> Map<String, Value> {
    metadata
        .iter()
        .filter(|(key, _)| {
            let collides = ReceiverRecord::FIELD_NAMES.contains(&key.as_str());
            if collides {
                warn!(callsign = %callsign, field = %key, "dropping receiver metadata that shadows a record field");
            }
            !collides
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
