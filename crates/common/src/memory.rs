mod in_memory_document_store;

pub use in_memory_document_store::*;
