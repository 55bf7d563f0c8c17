use crate::domain::archive_merge::ListenerRefs;
use crate::domain::conflict_retry::with_conflict_retry;
use crate::domain::listener_merge::add_relevant_flight;
use common::domain::{
    Document, DocumentStore, DomainResult, GetDocumentInput, PutDocumentInput, QueryViewInput,
    ViewName,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Links listeners' status documents to the flights they heard
pub struct RelevanceLinker {
    store: Arc<dyn DocumentStore>,
    max_attempts: u32,
}

impl RelevanceLinker {
    pub fn new(store: Arc<dyn DocumentStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts,
        }
    }

    /// Most recent listener-info and listener-telem ids for a callsign
    pub async fn resolve(&self, callsign: &str) -> DomainResult<ListenerRefs> {
        Ok(ListenerRefs {
            latest_info: self.latest_document_id(ViewName::ListenerInfo, callsign).await?,
            latest_telem: self
                .latest_document_id(ViewName::ListenerTelem, callsign)
                .await?,
        })
    }

    /// Top row of a descending query from `callsign`, if it belongs to `callsign`
    pub async fn latest_document_id(
        &self,
        view: ViewName,
        callsign: &str,
    ) -> DomainResult<Option<String>> {
        let rows = self
            .store
            .query_view(QueryViewInput {
                view,
                start_key: callsign.to_string(),
                descending: true,
                limit: Some(1),
            })
            .await?;

        match rows.into_iter().next() {
            Some(row) if row.key.primary == callsign => Ok(Some(row.id)),
            Some(row) => {
                debug!(
                    view = view.as_str(),
                    callsign = %callsign,
                    row_callsign = %row.key.primary,
                    "index row belongs to another listener, ignoring"
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Tag both referenced documents with `flight`; returns how many were written
    pub async fn tag_flight(&self, refs: &ListenerRefs, flight: &str) -> DomainResult<usize> {
        let mut written = 0;
        for id in [refs.latest_info.as_deref(), refs.latest_telem.as_deref()]
            .into_iter()
            .flatten()
        {
            if self.tag_document(id, flight).await? {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Append `flight` to one listener document's relevant flights
    pub async fn tag_document(&self, id: &str, flight: &str) -> DomainResult<bool> {
        with_conflict_retry(id, self.max_attempts, |attempt| async move {
            let Some(stored) = self
                .store
                .get_document(GetDocumentInput { id: id.to_string() })
                .await?
            else {
                warn!(document_id = %id, flight = %flight, "listener document vanished, not tagging");
                return Ok(false);
            };

            let next = match &stored.document {
                Document::ListenerInfo(doc) => {
                    add_relevant_flight(doc, flight).map(Document::ListenerInfo)
                }
                Document::ListenerTelem(doc) => {
                    add_relevant_flight(doc, flight).map(Document::ListenerTelem)
                }
                Document::PayloadTelemetry(_) => {
                    warn!(document_id = %id, "referenced document is not a listener document");
                    return Ok(false);
                }
            };

            let Some(next) = next else {
                debug!(document_id = %id, flight = %flight, "flight already recorded");
                return Ok(false);
            };

            self.store
                .put_document(PutDocumentInput {
                    id: id.to_string(),
                    expected_rev: Some(stored.rev),
                    document: next,
                })
                .await?;

            info!(document_id = %id, flight = %flight, attempt, "tagged listener document");
            Ok(true)
        })
        .await
    }

    /// Ids of listener documents tagged with `flight`, in view order
    pub async fn listener_documents_for_flight(&self, flight: &str) -> DomainResult<Vec<String>> {
        let rows = self
            .store
            .query_view(QueryViewInput {
                view: ViewName::RelevantFlights,
                start_key: flight.to_string(),
                descending: false,
                limit: None,
            })
            .await?;

        Ok(rows
            .into_iter()
            .take_while(|row| row.key.primary == flight)
            .map(|row| row.id)
            .collect())
    }
}
