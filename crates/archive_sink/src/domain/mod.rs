mod archive_merge;
mod archive_sink_service;
mod conflict_retry;
mod consensus;
mod listener_merge;
mod payload_identity;
mod relevance_linker;

pub use archive_merge::*;
pub use archive_sink_service::*;
pub use conflict_retry::*;
pub use consensus::*;
pub use listener_merge::*;
pub use payload_identity::*;
pub use relevance_linker::*;
