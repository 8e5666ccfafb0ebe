//! Inventory
//!
//! Credential profiles, jump-host profiles and device records, persisted as
//! JSON maps keyed by name.

pub mod csv;
pub mod error;
pub mod registry;
pub mod types;

pub use error::{InventoryError, RecordKind};
pub use registry::Inventory;
pub use types::{
    CredentialProfile, CredentialSummary, DeviceRecord, InventoryData, JumpHostProfile,
    JumpHostSummary,
};
