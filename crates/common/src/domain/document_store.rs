use crate::domain::document::Document;
use crate::domain::result::DomainResult;
use async_trait::async_trait;

/// Opaque revision token; a write must present the token it read
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(pub String);

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document as read from the store, together with its revision
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub rev: Revision,
    pub document: Document,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetDocumentInput {
    pub id: String,
}

/// Conditional write input
///
/// `expected_rev: None` means the document must not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PutDocumentInput {
    pub id: String,
    pub expected_rev: Option<Revision>,
    pub document: Document,
}

/// Secondary indexes maintained by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewName {
    /// listener_info documents keyed by (callsign, time_created)
    ListenerInfo,
    /// listener_telem documents keyed by (callsign, time_created)
    ListenerTelem,
    /// listener documents keyed by (flight, time_created), one row per relevant flight
    RelevantFlights,
}

impl ViewName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListenerInfo => "habitat/listener_info",
            Self::ListenerTelem => "habitat/listener_telem",
            Self::RelevantFlights => "habitat/relevant_flights",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewKey {
    pub primary: String,
    pub secondary: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRow {
    pub id: String,
    pub key: ViewKey,
}

/// Query a view starting at `start_key`
///
/// Ascending queries return rows with key >= (start_key, -inf);
/// descending queries return rows with key <= (start_key, +inf),
/// highest first. Rows for other primary keys are not filtered out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryViewInput {
    pub view: ViewName,
    pub start_key: String,
    pub descending: bool,
    pub limit: Option<usize>,
}

/// Client for a replicated document store with per-document
/// optimistic concurrency control.
/// Infrastructure layer (e.g., the in-memory store) implements this trait
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document and its current revision
    async fn get_document(&self, input: GetDocumentInput) -> DomainResult<Option<StoredDocument>>;

    /// Conditionally write a document
    ///
    /// Fails with `DomainError::DocumentConflict` when `expected_rev`
    /// does not match the stored revision.
    async fn put_document(&self, input: PutDocumentInput) -> DomainResult<Revision>;

    /// Query a secondary index, rows ordered by key
    async fn query_view(&self, input: QueryViewInput) -> DomainResult<Vec<ViewRow>>;
}
