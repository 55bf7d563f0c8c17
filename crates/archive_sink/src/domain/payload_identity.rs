use base64::{Engine, engine::general_purpose::STANDARD};
use common::domain::{DomainError, DomainResult};
use sha2::{Digest, Sha256};

/// Decode the base64 text a listener submitted into the bytes it heard
pub fn decode_raw_payload(encoded: &str) -> DomainResult<Vec<u8>> {
    STANDARD
        .decode(encoded)
        .map_err(|e| DomainError::MalformedMessage(format!("raw payload is not base64: {e}")))
}

/// Archive document id for a raw payload: lowercase hex SHA-256 of the bytes
pub fn payload_document_id(raw: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw);
    format!("{:x}", hasher.finalize())
}

/// Decode and hash in one step
pub fn payload_document_id_for_encoded(encoded: &str) -> DomainResult<String> {
    decode_raw_payload(encoded).map(|bytes| payload_document_id(&bytes))
}
