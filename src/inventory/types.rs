//! Inventory records

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::error::InventoryError;

fn default_port() -> u16 {
    22
}

/// Username / password / enable-secret profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialProfile {
    #[serde(default)]
    pub name: String,
    pub username: String,
    pub password: String,
    /// Enable (privileged mode) password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl CredentialProfile {
    pub fn normalize(mut self) -> Result<Self, InventoryError> {
        self.name = required("name", &self.name)?;
        self.username = required("username", &self.username)?;
        self.secret = optional(self.secret);
        Ok(self)
    }

    pub fn summary(&self) -> CredentialSummary {
        CredentialSummary {
            username: self.username.clone(),
            has_secret: self.secret.is_some(),
        }
    }
}

/// Bastion host profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JumpHostProfile {
    #[serde(default)]
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl JumpHostProfile {
    pub fn normalize(mut self) -> Result<Self, InventoryError> {
        self.name = required("name", &self.name)?;
        self.host = required("host", &self.host)?;
        self.username = required("username", &self.username)?;
        check_port(self.port)?;
        Ok(self)
    }

    pub fn summary(&self) -> JumpHostSummary {
        JumpHostSummary {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
        }
    }
}

/// A managed network device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(default)]
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Driver wire name, e.g. `cisco_ios`; resolved when a session opens
    pub device_type: String,
    #[serde(default)]
    pub credential_name: String,
    #[serde(default)]
    pub jumphost_profile: Option<String>,
    #[serde(default)]
    pub jumphost2_profile: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl DeviceRecord {
    /// Trim fields and enforce the record invariants
    pub fn normalize(mut self) -> Result<Self, InventoryError> {
        self.name = required("name", &self.name)?;
        self.host = required("host", &self.host)?;
        self.device_type = required("device_type", &self.device_type)?;
        self.credential_name = required("credential_name", &self.credential_name)?;
        check_port(self.port)?;

        self.jumphost_profile = optional(self.jumphost_profile);
        self.jumphost2_profile = optional(self.jumphost2_profile);
        if self.jumphost2_profile.is_some() && self.jumphost_profile.is_none() {
            return Err(InventoryError::Validation(format!(
                "device '{}': jumphost2_profile requires jumphost_profile",
                self.name
            )));
        }

        self.tags = self
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        Ok(self)
    }

    /// Jump-host chain the device expects, in hop order
    pub fn hops(&self) -> Vec<&str> {
        self.jumphost_profile
            .iter()
            .chain(self.jumphost2_profile.iter())
            .map(String::as_str)
            .collect()
    }

    pub fn references_credential(&self, name: &str) -> bool {
        self.credential_name == name
    }

    pub fn references_jumphost(&self, name: &str) -> bool {
        self.jumphost_profile.as_deref() == Some(name)
            || self.jumphost2_profile.as_deref() == Some(name)
    }
}

/// Credential listing without secrets
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialSummary {
    pub username: String,
    pub has_secret: bool,
}

/// Jump host listing without the password
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JumpHostSummary {
    pub host: String,
    pub port: u16,
    pub username: String,
}

/// One consistent view of all three registries
#[derive(Debug, Clone, Default)]
pub struct InventoryData {
    pub credentials: BTreeMap<String, CredentialProfile>,
    pub jumphosts: BTreeMap<String, JumpHostProfile>,
    pub devices: BTreeMap<String, DeviceRecord>,
}

impl InventoryData {
    pub fn device(&self, name: &str) -> Option<&DeviceRecord> {
        self.devices.get(name)
    }

    pub fn credential(&self, name: &str) -> Option<&CredentialProfile> {
        self.credentials.get(name)
    }

    pub fn jumphost(&self, name: &str) -> Option<&JumpHostProfile> {
        self.jumphosts.get(name)
    }

    /// Devices referencing a credential profile, sorted by name
    pub fn devices_using_credential(&self, name: &str) -> Vec<String> {
        self.devices
            .values()
            .filter(|d| d.references_credential(name))
            .map(|d| d.name.clone())
            .collect()
    }

    /// Devices referencing a jump host in either hop, sorted by name
    pub fn devices_using_jumphost(&self, name: &str) -> Vec<String> {
        self.devices
            .values()
            .filter(|d| d.references_jumphost(name))
            .map(|d| d.name.clone())
            .collect()
    }
}

fn required(field: &str, value: &str) -> Result<String, InventoryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(InventoryError::Validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_port(port: u16) -> Result<(), InventoryError> {
    if port == 0 {
        return Err(InventoryError::Validation("port must be between 1 and 65535".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str) -> DeviceRecord {
        DeviceRecord {
            name: name.to_string(),
            host: "10.0.0.1".to_string(),
            port: 22,
            device_type: "cisco_ios".to_string(),
            credential_name: "lab".to_string(),
            jumphost_profile: None,
            jumphost2_profile: None,
            tags: BTreeSet::new(),
        }
    }

    #[test]
    fn test_second_hop_requires_first() {
        let mut record = device("r1");
        record.jumphost2_profile = Some("bastion2".to_string());

        let err = record.normalize().unwrap_err();
        assert!(matches!(err, InventoryError::Validation(_)));
    }

    #[test]
    fn test_blank_hops_become_none() {
        let mut record = device("r1");
        record.jumphost_profile = Some("  ".to_string());
        record.jumphost2_profile = Some(String::new());

        let record = record.normalize().unwrap();
        assert!(record.hops().is_empty());
    }

    #[test]
    fn test_tags_are_trimmed_and_deduplicated() {
        let mut record = device("r1");
        record.tags = [" core", "core", "", "edge "]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let record = record.normalize().unwrap();
        let tags: Vec<_> = record.tags.iter().cloned().collect();
        assert_eq!(tags, vec!["core", "edge"]);
    }

    #[test]
    fn test_hops_in_order() {
        let mut record = device("r1");
        record.jumphost_profile = Some("b1".to_string());
        record.jumphost2_profile = Some("b2".to_string());
        assert_eq!(record.hops(), vec!["b1", "b2"]);
    }

    #[test]
    fn test_device_defaults_from_json() {
        let record: DeviceRecord = serde_json::from_str(
            r#"{ "name": "sw1", "host": "10.1.1.1", "device_type": "cisco_nxos", "credential_name": "lab" }"#,
        )
        .unwrap();
        assert_eq!(record.port, 22);
        assert!(record.tags.is_empty());
    }

    #[test]
    fn test_empty_secret_is_none() {
        let profile = CredentialProfile {
            name: "lab".into(),
            username: "admin".into(),
            password: "pw".into(),
            secret: Some(String::new()),
        };
        let profile = profile.normalize().unwrap();
        assert!(profile.secret.is_none());
        assert!(!profile.summary().has_secret);
    }

    #[test]
    fn test_jumphost_rejects_port_zero() {
        let profile = JumpHostProfile {
            name: "b1".into(),
            host: "bastion".into(),
            port: 0,
            username: "jump".into(),
            password: "pw".into(),
        };
        assert!(profile.normalize().is_err());
    }
}
