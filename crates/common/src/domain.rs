mod document;
mod document_store;
mod message;
mod result;

pub use document::*;
pub use document_store::*;
pub use message::*;
pub use result::*;
