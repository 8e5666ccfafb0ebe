//! Inventory error types

use std::fmt;

use thiserror::Error;

use crate::config::StorageError;

/// Which registry a record lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Credential,
    JumpHost,
    Device,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordKind::Credential => "Credential",
            RecordKind::JumpHost => "Jump host",
            RecordKind::Device => "Device",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("{0}")]
    Validation(String),

    #[error("{kind} '{name}' not found")]
    NotFound { kind: RecordKind, name: String },

    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: RecordKind, name: String },

    #[error("{kind} '{name}' is still used by device(s): {}", .devices.join(", "))]
    InUse {
        kind: RecordKind,
        name: String,
        devices: Vec<String>,
    },

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<csv::Error> for InventoryError {
    fn from(err: csv::Error) -> Self {
        InventoryError::Csv(err.to_string())
    }
}
