//! Batch module - concurrent command fan-out and result export

mod executor;
pub mod export;
mod types;

pub use executor::{BatchExecutor, ExecutorSettings};
pub use export::{archive_name, export_results, ExportError};
pub use types::{
    BatchEntry, BatchError, BatchEvent, BatchRequest, DeviceFailure, DeviceStatus, JobSummary,
};
