use crate::domain::archive_merge::merge_payload_telemetry;
use crate::domain::conflict_retry::{DEFAULT_MAX_MERGE_ATTEMPTS, with_conflict_retry};
use crate::domain::consensus::DEFAULT_TIME_TOLERANCE_SECS;
use crate::domain::listener_merge::{
    ListenerInfoDecision, listener_info_document_id, merge_listener_info, merge_listener_telem,
};
use crate::domain::payload_identity::payload_document_id_for_encoded;
use crate::domain::relevance_linker::RelevanceLinker;
use common::domain::{
    Document, DocumentStore, DomainError, DomainResult, GetDocumentInput, Message, MessageKind,
    PutDocumentInput, StoredDocument, ViewName,
};
use common::garde::validate_message;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Tunables for the archive sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSinkConfig {
    /// Conflicting writes tolerated per document before giving up
    pub max_merge_attempts: u32,
    /// Window used by the consensus timestamp estimate
    pub time_tolerance_secs: i64,
}

impl Default for ArchiveSinkConfig {
    fn default() -> Self {
        Self {
            max_merge_attempts: DEFAULT_MAX_MERGE_ATTEMPTS,
            time_tolerance_secs: DEFAULT_TIME_TOLERANCE_SECS,
        }
    }
}

/// What a pushed message did to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Telemetry merged into its payload document. `written` is false when
    /// the merge produced the document already stored.
    Archived {
        document_id: String,
        written: bool,
        tagged: usize,
    },
    ListenerInfoStored { document_id: String },
    ListenerInfoUnchanged,
    ListenerTelemStored { document_id: String },
}

/// Domain service that archives every incoming message
///
/// Flow for telemetry:
/// 1. Validate the message
/// 2. Derive the document id from the decoded payload
/// 3. Resolve the sender's latest listener documents
/// 4. Read, merge and conditionally write until the write sticks
/// 5. Tag the sender's listener documents with the flight, if any
pub struct ArchiveSink {
    store: Arc<dyn DocumentStore>,
    linker: RelevanceLinker,
    config: ArchiveSinkConfig,
}

impl ArchiveSink {
    pub fn new(store: Arc<dyn DocumentStore>, config: ArchiveSinkConfig) -> Self {
        let linker = RelevanceLinker::new(Arc::clone(&store), config.max_merge_attempts);
        Self {
            store,
            linker,
            config,
        }
    }

    pub fn linker(&self) -> &RelevanceLinker {
        &self.linker
    }

    /// Archive one message. Malformed messages are rejected before the
    /// store is touched.
    #[instrument(skip(self, message), fields(callsign = %message.callsign(), kind = %message.kind()))]
    pub async fn push_message(&self, message: Message) -> DomainResult<PushOutcome> {
        validate_message(&message)?;

        match message.kind() {
            MessageKind::RawTelemetry | MessageKind::ParsedTelemetry => {
                self.archive_telemetry(&message).await
            }
            MessageKind::ListenerInfo => self.store_listener_info(&message).await,
            MessageKind::ListenerTelem => self.store_listener_telem(&message).await,
        }
    }

    async fn archive_telemetry(&self, message: &Message) -> DomainResult<PushOutcome> {
        let raw = message.raw_payload().ok_or_else(|| {
            DomainError::MalformedMessage(format!("{} carries no payload", message.kind()))
        })?;
        let document_id = payload_document_id_for_encoded(raw)?;
        let refs = self.linker.resolve(message.callsign()).await?;

        let id = document_id.as_str();
        let refs_ref = &refs;
        let written = with_conflict_retry(id, self.config.max_merge_attempts, |attempt| async move {
            let (current, expected_rev) = match self
                .store
                .get_document(GetDocumentInput { id: id.to_string() })
                .await?
            {
                Some(StoredDocument {
                    document: Document::PayloadTelemetry(doc),
                    rev,
                    ..
                }) => (Some(doc), Some(rev)),
                Some(other) => {
                    return Err(DomainError::RepositoryError(anyhow::anyhow!(
                        "document {} is {}, expected payload_telemetry",
                        id,
                        other.document.type_name()
                    )));
                }
                None => (None, None),
            };

            let next = merge_payload_telemetry(
                current.as_ref(),
                message,
                refs_ref,
                self.config.time_tolerance_secs,
            )?;

            if current.as_ref() == Some(&next) {
                debug!(document_id = %id, "merge changed nothing, skipping write");
                return Ok(false);
            }

            self.store
                .put_document(PutDocumentInput {
                    id: id.to_string(),
                    expected_rev,
                    document: Document::PayloadTelemetry(next),
                })
                .await?;

            debug!(document_id = %id, attempt, "payload telemetry written");
            Ok(true)
        })
        .await?;

        let tagged = match message.flight() {
            Some(flight) => self.linker.tag_flight(&refs, flight).await?,
            None => 0,
        };

        info!(
            document_id = %document_id,
            written,
            tagged,
            "archived payload telemetry"
        );

        Ok(PushOutcome::Archived {
            document_id,
            written,
            tagged,
        })
    }

    async fn store_listener_info(&self, message: &Message) -> DomainResult<PushOutcome> {
        let callsign = message.callsign();
        let target = format!("listener_info:{callsign}");

        let stored = with_conflict_retry(&target, self.config.max_merge_attempts, |_| async move {
            let latest_id = self
                .linker
                .latest_document_id(ViewName::ListenerInfo, callsign)
                .await?;
            let latest = match &latest_id {
                Some(id) => match self
                    .store
                    .get_document(GetDocumentInput { id: id.clone() })
                    .await?
                {
                    Some(StoredDocument {
                        document: Document::ListenerInfo(doc),
                        ..
                    }) => Some(doc),
                    _ => None,
                },
                None => None,
            };

            let doc = match merge_listener_info(latest.as_ref(), message)? {
                ListenerInfoDecision::Unchanged => return Ok(None),
                ListenerInfoDecision::Create(doc) => doc,
            };

            // A concurrent writer that read the same latest document lands on the same id
            let id = listener_info_document_id(callsign, latest_id.as_deref(), &doc.data);
            if self
                .store
                .get_document(GetDocumentInput { id: id.clone() })
                .await?
                .is_some()
            {
                debug!(document_id = %id, "listener info already recorded");
                return Ok(None);
            }

            self.store
                .put_document(PutDocumentInput {
                    id: id.clone(),
                    expected_rev: None,
                    document: Document::ListenerInfo(doc),
                })
                .await?;
            Ok(Some(id))
        })
        .await?;

        match stored {
            Some(document_id) => {
                info!(document_id = %document_id, "stored listener info");
                Ok(PushOutcome::ListenerInfoStored { document_id })
            }
            None => {
                debug!("listener info unchanged");
                Ok(PushOutcome::ListenerInfoUnchanged)
            }
        }
    }

    async fn store_listener_telem(&self, message: &Message) -> DomainResult<PushOutcome> {
        let target = format!("listener_telem:{}", message.callsign());

        let document_id = with_conflict_retry(&target, self.config.max_merge_attempts, |_| async move {
            let doc = merge_listener_telem(message)?;
            let id = xid::new().to_string();
            self.store
                .put_document(PutDocumentInput {
                    id: id.clone(),
                    expected_rev: None,
                    document: Document::ListenerTelem(doc),
                })
                .await?;
            Ok(id)
        })
        .await?;

        info!(document_id = %document_id, "stored listener telem");
        Ok(PushOutcome::ListenerTelemStored { document_id })
    }
}
