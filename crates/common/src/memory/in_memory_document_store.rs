use crate::domain::{
    Document, DocumentStore, DomainError, DomainResult, GetDocumentInput, PutDocumentInput,
    QueryViewInput, Revision, StoredDocument, ViewKey, ViewName, ViewRow,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

struct Entry {
    generation: u64,
    rev: Revision,
    document: Document,
}

/// In-memory implementation of `DocumentStore` using a `HashMap`.
///
/// Conditional writes hold the write lock for the revision check and the
/// update, so they are atomic with respect to each other. Views are built
/// on demand from the current documents.
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<String, Entry>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// All documents, ordered by id
    pub async fn snapshot(&self) -> BTreeMap<String, Document> {
        let documents = self.documents.read().await;
        documents
            .iter()
            .map(|(id, entry)| (id.clone(), entry.document.clone()))
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.documents.read().await.len()
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn view_rows(view: ViewName, id: &str, document: &Document) -> Vec<ViewRow> {
    let row = |primary: &str, secondary: i64| ViewRow {
        id: id.to_string(),
        key: ViewKey {
            primary: primary.to_string(),
            secondary,
        },
    };

    match (view, document) {
        (ViewName::ListenerInfo, Document::ListenerInfo(doc))
        | (ViewName::ListenerTelem, Document::ListenerTelem(doc)) => {
            vec![row(&doc.callsign, doc.time_created)]
        }
        (ViewName::RelevantFlights, Document::ListenerInfo(doc))
        | (ViewName::RelevantFlights, Document::ListenerTelem(doc)) => doc
            .relevant_flights
            .iter()
            .flatten()
            .map(|flight| row(flight, doc.time_created))
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_document(&self, input: GetDocumentInput) -> DomainResult<Option<StoredDocument>> {
        let documents = self.documents.read().await;
        Ok(documents.get(&input.id).map(|entry| StoredDocument {
            id: input.id.clone(),
            rev: entry.rev.clone(),
            document: entry.document.clone(),
        }))
    }

    async fn put_document(&self, input: PutDocumentInput) -> DomainResult<Revision> {
        let mut documents = self.documents.write().await;

        let generation = match (documents.get(&input.id), &input.expected_rev) {
            (None, None) => 1,
            (Some(entry), Some(expected)) if entry.rev == *expected => entry.generation + 1,
            (Some(_), None) => {
                return Err(DomainError::DocumentConflict(format!(
                    "{} already exists",
                    input.id
                )));
            }
            (None, Some(expected)) => {
                return Err(DomainError::DocumentConflict(format!(
                    "{} does not exist (expected revision {})",
                    input.id, expected
                )));
            }
            (Some(entry), Some(expected)) => {
                return Err(DomainError::DocumentConflict(format!(
                    "{} is at revision {}, not {}",
                    input.id, entry.rev, expected
                )));
            }
        };

        let rev = Revision(format!("{}-{}", generation, xid::new()));
        debug!(document_id = %input.id, rev = %rev, "stored document");
        documents.insert(
            input.id,
            Entry {
                generation,
                rev: rev.clone(),
                document: input.document,
            },
        );
        Ok(rev)
    }

    async fn query_view(&self, input: QueryViewInput) -> DomainResult<Vec<ViewRow>> {
        let documents = self.documents.read().await;

        let mut rows: Vec<ViewRow> = documents
            .iter()
            .flat_map(|(id, entry)| view_rows(input.view, id, &entry.document))
            .collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.id.cmp(&b.id)));

        let start = input.start_key.as_str();
        let rows: Vec<ViewRow> = if input.descending {
            rows.into_iter()
                .rev()
                .filter(|row| row.key.primary.as_str() <= start)
                .collect()
        } else {
            rows.into_iter()
                .filter(|row| row.key.primary.as_str() >= start)
                .collect()
        };

        Ok(match input.limit {
            Some(limit) => rows.into_iter().take(limit).collect(),
            None => rows,
        })
    }
}
