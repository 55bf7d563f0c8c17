use common::domain::{DomainError, DomainResult};
use std::future::Future;
use tracing::{debug, warn};

/// Attempts allowed per document before a merge is abandoned
pub const DEFAULT_MAX_MERGE_ATTEMPTS: u32 = 30;

/// Run a read-merge-conditional-write cycle until it stops conflicting.
///
/// `attempt` must re-read the document on every call; a
/// `DomainError::DocumentConflict` from it means another writer got there
/// first and the cycle is repeated. Any other outcome is returned as is.
/// After `max_attempts` conflicts the store is left as the last writer
/// left it and `DomainError::RetriesExhausted` is returned.
pub async fn with_conflict_retry<T, F, Fut>(
    document_id: &str,
    max_attempts: u32,
    mut attempt: F,
) -> DomainResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = DomainResult<T>>,
{
    for n in 1..=max_attempts {
        match attempt(n).await {
            Err(DomainError::DocumentConflict(reason)) => {
                debug!(
                    document_id = %document_id,
                    attempt = n,
                    reason = %reason,
                    "write conflict, merging again"
                );
            }
            result => return result,
        }
    }

    warn!(
        document_id = %document_id,
        attempts = max_attempts,
        "giving up after repeated write conflicts"
    );
    Err(DomainError::RetriesExhausted {
        document_id: document_id.to_string(),
        attempts: max_attempts,
    })
}
