//! Credential, jump-host and device registries
//!
//! All three registries share one `Arc<InventoryData>` snapshot behind a
//! `parking_lot::RwLock`. Readers clone the `Arc` and never block writers for
//! longer than a pointer swap. Writers are serialized by an async mutex, apply
//! their change to a private copy, persist it, and only then publish it, so a
//! failed validation or write leaves the visible state untouched.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::error::{InventoryError, RecordKind};
use super::types::{
    CredentialProfile, CredentialSummary, DeviceRecord, InventoryData, JumpHostProfile,
    JumpHostSummary,
};
use crate::config::JsonStore;

pub const CREDENTIALS_FILE: &str = "credentials.json";
pub const JUMPHOSTS_FILE: &str = "jumphosts.json";
pub const INVENTORY_FILE: &str = "inventory.json";

/// Which file a mutation has to rewrite
#[derive(Debug, Clone, Copy)]
enum Section {
    Credentials,
    JumpHosts,
    Devices,
}

struct InventoryFiles {
    credentials: JsonStore,
    jumphosts: JsonStore,
    devices: JsonStore,
}

pub struct Inventory {
    data: RwLock<Arc<InventoryData>>,
    write_lock: Mutex<()>,
    files: Option<InventoryFiles>,
}

impl Inventory {
    /// Inventory without persistence
    pub fn in_memory() -> Self {
        Self::from_data(InventoryData::default())
    }

    pub fn from_data(data: InventoryData) -> Self {
        Self {
            data: RwLock::new(Arc::new(data)),
            write_lock: Mutex::new(()),
            files: None,
        }
    }

    /// Load the registries from `data_dir`, creating nothing until the first write
    pub async fn open(data_dir: &Path) -> Result<Self, InventoryError> {
        let files = InventoryFiles {
            credentials: JsonStore::with_path(data_dir.join(CREDENTIALS_FILE)),
            jumphosts: JsonStore::with_path(data_dir.join(JUMPHOSTS_FILE)),
            devices: JsonStore::with_path(data_dir.join(INVENTORY_FILE)),
        };

        // Keys are authoritative; files written by older versions may omit
        // `name` or carry blank optional fields, so every record is normalized
        let data = InventoryData {
            credentials: sanitize(files.credentials.load().await?, CREDENTIALS_FILE),
            jumphosts: sanitize(files.jumphosts.load().await?, JUMPHOSTS_FILE),
            devices: sanitize(files.devices.load().await?, INVENTORY_FILE),
        };

        info!(
            "Inventory loaded from {}: {} devices, {} credentials, {} jump hosts",
            data_dir.display(),
            data.devices.len(),
            data.credentials.len(),
            data.jumphosts.len()
        );

        Ok(Self {
            data: RwLock::new(Arc::new(data)),
            write_lock: Mutex::new(()),
            files: Some(files),
        })
    }

    /// Consistent read-only view of all registries
    pub fn snapshot(&self) -> Arc<InventoryData> {
        self.data.read().clone()
    }

    async fn mutate<F, R>(&self, section: Section, apply: F) -> Result<R, InventoryError>
    where
        F: FnOnce(&mut InventoryData) -> Result<R, InventoryError>,
    {
        let _guard = self.write_lock.lock().await;

        let mut next = (*self.snapshot()).clone();
        let outcome = apply(&mut next)?;

        if let Some(files) = &self.files {
            match section {
                Section::Credentials => files.credentials.save(&next.credentials).await?,
                Section::JumpHosts => files.jumphosts.save(&next.jumphosts).await?,
                Section::Devices => files.devices.save(&next.devices).await?,
            }
        }

        *self.data.write() = Arc::new(next);
        Ok(outcome)
    }

    // ===== Credentials =====

    pub fn list_credentials(&self) -> BTreeMap<String, CredentialSummary> {
        self.snapshot()
            .credentials
            .iter()
            .map(|(name, c)| (name.clone(), c.summary()))
            .collect()
    }

    pub async fn add_credential(&self, profile: CredentialProfile) -> Result<(), InventoryError> {
        let profile = profile.normalize()?;
        self.mutate(Section::Credentials, |data| {
            insert_new(&mut data.credentials, RecordKind::Credential, profile.name.clone(), profile)
        })
        .await
    }

    pub async fn update_credential(
        &self,
        name: &str,
        mut profile: CredentialProfile,
    ) -> Result<(), InventoryError> {
        profile.name = name.to_string();
        let profile = profile.normalize()?;
        self.mutate(Section::Credentials, |data| {
            replace_existing(&mut data.credentials, RecordKind::Credential, profile)
        })
        .await
    }

    pub async fn delete_credential(&self, name: &str) -> Result<(), InventoryError> {
        self.mutate(Section::Credentials, |data| {
            let devices = data.devices_using_credential(name);
            if !devices.is_empty() {
                return Err(InventoryError::InUse {
                    kind: RecordKind::Credential,
                    name: name.to_string(),
                    devices,
                });
            }
            remove_existing(&mut data.credentials, RecordKind::Credential, name)
        })
        .await
    }

    // ===== Jump hosts =====

    pub fn list_jumphosts(&self) -> BTreeMap<String, JumpHostSummary> {
        self.snapshot()
            .jumphosts
            .iter()
            .map(|(name, j)| (name.clone(), j.summary()))
            .collect()
    }

    pub async fn add_jumphost(&self, profile: JumpHostProfile) -> Result<(), InventoryError> {
        let profile = profile.normalize()?;
        self.mutate(Section::JumpHosts, |data| {
            insert_new(&mut data.jumphosts, RecordKind::JumpHost, profile.name.clone(), profile)
        })
        .await
    }

    pub async fn update_jumphost(
        &self,
        name: &str,
        mut profile: JumpHostProfile,
    ) -> Result<(), InventoryError> {
        profile.name = name.to_string();
        let profile = profile.normalize()?;
        self.mutate(Section::JumpHosts, |data| {
            replace_existing(&mut data.jumphosts, RecordKind::JumpHost, profile)
        })
        .await
    }

    pub async fn delete_jumphost(&self, name: &str) -> Result<(), InventoryError> {
        self.mutate(Section::JumpHosts, |data| {
            let devices = data.devices_using_jumphost(name);
            if !devices.is_empty() {
                return Err(InventoryError::InUse {
                    kind: RecordKind::JumpHost,
                    name: name.to_string(),
                    devices,
                });
            }
            remove_existing(&mut data.jumphosts, RecordKind::JumpHost, name)
        })
        .await
    }

    // ===== Devices =====

    pub fn list_devices(&self) -> BTreeMap<String, DeviceRecord> {
        self.snapshot().devices.clone()
    }

    pub async fn add_device(&self, record: DeviceRecord) -> Result<DeviceRecord, InventoryError> {
        let record = record.normalize()?;
        self.mutate(Section::Devices, |data| {
            insert_new(&mut data.devices, RecordKind::Device, record.name.clone(), record.clone())?;
            Ok(record)
        })
        .await
    }

    pub async fn update_device(
        &self,
        name: &str,
        mut record: DeviceRecord,
    ) -> Result<DeviceRecord, InventoryError> {
        record.name = name.to_string();
        let record = record.normalize()?;
        self.mutate(Section::Devices, |data| {
            replace_existing(&mut data.devices, RecordKind::Device, record.clone())?;
            Ok(record)
        })
        .await
    }

    pub async fn delete_device(&self, name: &str) -> Result<(), InventoryError> {
        self.mutate(Section::Devices, |data| {
            remove_existing(&mut data.devices, RecordKind::Device, name)
        })
        .await
    }

    /// Insert or overwrite already-normalized devices in one write
    pub async fn upsert_devices(&self, records: Vec<DeviceRecord>) -> Result<usize, InventoryError> {
        let count = records.len();
        self.mutate(Section::Devices, |data| {
            for record in records {
                data.devices.insert(record.name.clone(), record);
            }
            Ok(count)
        })
        .await
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn insert_new<T>(
    map: &mut BTreeMap<String, T>,
    kind: RecordKind,
    name: String,
    value: T,
) -> Result<(), InventoryError> {
    if map.contains_key(&name) {
        return Err(InventoryError::AlreadyExists { kind, name });
    }
    map.insert(name, value);
    Ok(())
}

trait Named: Sized {
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
    fn validated(self) -> Result<Self, InventoryError>;
}

macro_rules! impl_named {
    ($($ty:ty),*) => {
        $(
            impl Named for $ty {
                fn name(&self) -> &str {
                    &self.name
                }

                fn set_name(&mut self, name: String) {
                    self.name = name;
                }

                fn validated(self) -> Result<Self, InventoryError> {
                    self.normalize()
                }
            }
        )*
    };
}

impl_named!(CredentialProfile, JumpHostProfile, DeviceRecord);

/// Normalize records read from disk, dropping the ones that fail validation
fn sanitize<T: Named>(loaded: BTreeMap<String, T>, file: &str) -> BTreeMap<String, T> {
    let mut kept = BTreeMap::new();
    for (key, mut record) in loaded {
        record.set_name(key.clone());
        match record.validated() {
            Ok(record) => {
                kept.insert(record.name().to_string(), record);
            }
            Err(e) => warn!("Skipping invalid entry '{}' in {}: {}", key, file, e),
        }
    }
    kept
}

fn replace_existing<T: Named>(
    map: &mut BTreeMap<String, T>,
    kind: RecordKind,
    value: T,
) -> Result<(), InventoryError> {
    match map.get_mut(value.name()) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(InventoryError::NotFound {
            kind,
            name: value.name().to_string(),
        }),
    }
}

fn remove_existing<T>(
    map: &mut BTreeMap<String, T>,
    kind: RecordKind,
    name: &str,
) -> Result<(), InventoryError> {
    map.remove(name).map(|_| ()).ok_or_else(|| InventoryError::NotFound {
        kind,
        name: name.to_string(),
    })
}
