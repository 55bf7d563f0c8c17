pub mod domain;
pub mod garde;
pub mod memory;
pub mod telemetry;

pub use domain::*;
pub use memory::*;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDocumentStore;
