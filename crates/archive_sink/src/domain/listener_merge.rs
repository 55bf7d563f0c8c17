use common::domain::{DomainError, DomainResult, ListenerDocument, Message, MessagePayload};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// What to do with an incoming listener-info report
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerInfoDecision {
    /// The latest stored description is identical
    Unchanged,
    Create(ListenerDocument),
}

/// Decide whether a listener-info report warrants a new document.
///
/// `latest` is the most recent listener_info document for the sender.
pub fn merge_listener_info(
    latest: Option<&ListenerDocument>,
    message: &Message,
) -> DomainResult<ListenerInfoDecision> {
    let MessagePayload::ListenerInfo(data) = &message.payload else {
        return Err(unexpected_kind(message, "listener info"));
    };

    let unchanged = latest
        .is_some_and(|doc| doc.callsign == message.callsign() && doc.data == *data);
    if unchanged {
        return Ok(ListenerInfoDecision::Unchanged);
    }

    Ok(ListenerInfoDecision::Create(new_listener_document(
        message,
        data.clone(),
    )))
}

/// Every listener-telem report becomes a new document
pub fn merge_listener_telem(message: &Message) -> DomainResult<ListenerDocument> {
    let MessagePayload::ListenerTelem(data) = &message.payload else {
        return Err(unexpected_kind(message, "listener telem"));
    };
    Ok(new_listener_document(message, data.clone()))
}

/// Append `flight` to the document's relevant flights.
///
/// Returns `None` when the flight is already listed.
pub fn add_relevant_flight(doc: &ListenerDocument, flight: &str) -> Option<ListenerDocument> {
    if doc.is_relevant_to(flight) {
        return None;
    }
    let mut next = doc.clone();
    next.relevant_flights
        .get_or_insert_with(Vec::new)
        .push(flight.to_string());
    Some(next)
}

/// Id for a listener-info document that supersedes `previous`.
///
/// Writers that read the same latest document and carry the same data
/// derive the same id, so at most one of them can create it.
pub fn listener_info_document_id(
    callsign: &str,
    previous: Option<&str>,
    data: &Map<String, Value>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(callsign.as_bytes());
    hasher.update([0u8]);
    hasher.update(previous.unwrap_or_default().as_bytes());
    hasher.update([0u8]);
    hasher.update(Value::Object(data.clone()).to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

fn new_listener_document(message: &Message, data: Map<String, Value>) -> ListenerDocument {
    ListenerDocument {
        callsign: message.callsign().to_string(),
        data,
        time_created: message.time_created,
        time_uploaded: message.time_uploaded,
        relevant_flights: None,
    }
}

fn unexpected_kind(message: &Message, expected: &str) -> DomainError {
    DomainError::MalformedMessage(format!(
        "expected a {} message, got {}",
        expected,
        message.kind()
    ))
}
