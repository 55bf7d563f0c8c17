//! Garde validation utilities.

use crate::domain::{DomainError, Message, MessagePayload};
use garde::{Report, Validate};

/// Convert garde validation report to DomainError
pub fn validate_struct<T>(value: &T) -> Result<(), DomainError>
where
    T: Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| DomainError::ValidationError(format_validation_errors(&report)))
}

/// Validate a message's source and any telemetry payload it carries
pub fn validate_message(message: &Message) -> Result<(), DomainError> {
    validate_struct(&message.source)?;
    match &message.payload {
        MessagePayload::RawTelemetry(raw) => validate_struct(raw),
        MessagePayload::ParsedTelemetry(parsed) => validate_struct(parsed),
        MessagePayload::ListenerInfo(_) | MessagePayload::ListenerTelem(_) => Ok(()),
    }
}

/// Format validation errors from garde Report into a human-readable string
fn format_validation_errors(report: &Report) -> String {
    report
        .iter()
        .map(|(path, error)| {
            if path.to_string().is_empty() {
                error.message().to_string()
            } else {
                format!("{}: {}", path, error.message())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
