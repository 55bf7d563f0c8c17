pub mod archive_worker;
pub mod domain;
pub mod ingest;

pub use archive_worker::*;
pub use domain::*;
pub use ingest::*;
