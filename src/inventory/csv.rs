//! Device inventory CSV import/export
//!
//! Columns: `name, host, device_type, port, credential_name,
//! jumphost_profile, jumphost2_profile, tags` with tags comma-joined inside
//! a single field.

use std::collections::BTreeSet;

use csv::{ReaderBuilder, Trim, Writer};
use serde::{Deserialize, Serialize};

use super::error::InventoryError;
use super::types::{DeviceRecord, InventoryData};

pub const CSV_HEADER: [&str; 8] = [
    "name",
    "host",
    "device_type",
    "port",
    "credential_name",
    "jumphost_profile",
    "jumphost2_profile",
    "tags",
];

pub const DEFAULT_DEVICE_TYPE: &str = "cisco_nxos";

/// Export every device, ordered by name
pub fn export_devices(data: &InventoryData) -> Result<String, InventoryError> {
    let mut wtr = Writer::from_writer(vec![]);
    wtr.write_record(CSV_HEADER)?;

    for device in data.devices.values() {
        wtr.write_record([
            device.name.clone(),
            device.host.clone(),
            device.device_type.clone(),
            device.port.to_string(),
            device.credential_name.clone(),
            device.jumphost_profile.clone().unwrap_or_default(),
            device.jumphost2_profile.clone().unwrap_or_default(),
            device.tags.iter().cloned().collect::<Vec<_>>().join(","),
        ])?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| InventoryError::Csv(format!("CSV writer error: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| InventoryError::Csv(format!("UTF-8 conversion error: {}", e)))
}

/// Parsed import: valid records plus one message per rejected row
#[derive(Debug, Default, Serialize)]
pub struct ImportOutcome {
    pub records: Vec<DeviceRecord>,
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    device_type: Option<String>,
    #[serde(default)]
    port: Option<String>,
    #[serde(default)]
    credential_name: Option<String>,
    #[serde(default)]
    jumphost_profile: Option<String>,
    #[serde(default)]
    jumphost2_profile: Option<String>,
    #[serde(default)]
    tags: Option<String>,
}

impl CsvRow {
    fn into_record(self) -> Result<Option<DeviceRecord>, InventoryError> {
        let name = self.name.unwrap_or_default();
        if name.trim().is_empty() {
            return Ok(None);
        }

        let port = match self.port.as_deref().map(str::trim) {
            None | Some("") => 22,
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| InventoryError::Validation(format!("invalid port '{}'", raw)))?,
        };

        let device_type = self
            .device_type
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DEVICE_TYPE.to_string());

        let tags: BTreeSet<String> = self
            .tags
            .unwrap_or_default()
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let record = DeviceRecord {
            name,
            host: self.host.unwrap_or_default(),
            port,
            device_type,
            credential_name: self.credential_name.unwrap_or_default(),
            jumphost_profile: self.jumphost_profile,
            jumphost2_profile: self.jumphost2_profile,
            tags,
        };
        record.normalize().map(Some)
    }
}

/// Parse an uploaded CSV document
///
/// Fails as a whole only when the input is not UTF-8 or has no header row.
/// Rows without a name are skipped; invalid rows are reported as
/// `Row N: reason` where N counts data rows from 1.
pub fn parse_devices(bytes: &[u8]) -> Result<ImportOutcome, InventoryError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| InventoryError::Csv(format!("file is not valid UTF-8: {}", e)))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    if !headers.iter().any(|h| h == "name") {
        return Err(InventoryError::Csv("missing 'name' column".into()));
    }

    let mut outcome = ImportOutcome::default();
    let mut seen = BTreeSet::new();

    for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row_number = index + 1;
        let parsed = row.map_err(InventoryError::from).and_then(CsvRow::into_record);

        match parsed {
            Ok(Some(record)) => {
                if !seen.insert(record.name.clone()) {
                    outcome
                        .errors
                        .push(format!("Row {}: duplicate device '{}'", row_number, record.name));
                    continue;
                }
                outcome.records.push(record);
            }
            Ok(None) => {}
            Err(e) => outcome.errors.push(format!("Row {}: {}", row_number, e)),
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_tags() {
        let csv = "name,host,device_type,port,credential_name,jumphost_profile,jumphost2_profile,tags\n\
                   sw1,10.0.0.1,,,lab,,,\"core, dc1\"\n";
        let outcome = parse_devices(csv.as_bytes()).unwrap();

        assert!(outcome.errors.is_empty());
        let record = &outcome.records[0];
        assert_eq!(record.device_type, "cisco_nxos");
        assert_eq!(record.port, 22);
        assert!(record.jumphost_profile.is_none());
        assert_eq!(record.tags.iter().cloned().collect::<Vec<_>>(), vec!["core", "dc1"]);
    }

    #[test]
    fn test_row_errors_do_not_abort_import() {
        let csv = "name,host,device_type,port,credential_name,jumphost_profile,jumphost2_profile,tags\n\
                   r1,10.0.0.1,cisco_ios,22,lab,,,\n\
                   r2,10.0.0.2,cisco_ios,abc,lab,,,\n\
                   ,10.0.0.3,cisco_ios,22,lab,,,\n\
                   r4,10.0.0.4,cisco_ios,22,lab,,b2,\n";
        let outcome = parse_devices(csv.as_bytes()).unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].name, "r1");
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.errors[0].starts_with("Row 2:"));
        assert!(outcome.errors[1].starts_with("Row 4:"));
    }

    #[test]
    fn test_duplicate_rows_reported() {
        let csv = "name,host,credential_name\nr1,10.0.0.1,lab\nr1,10.0.0.2,lab\n";
        let outcome = parse_devices(csv.as_bytes()).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.errors, vec!["Row 2: duplicate device 'r1'"]);
    }

    #[test]
    fn test_missing_name_column() {
        let csv = "host,port\n10.0.0.1,22\n";
        assert!(matches!(parse_devices(csv.as_bytes()), Err(InventoryError::Csv(_))));
    }

    #[test]
    fn test_export_then_import() {
        let mut data = InventoryData::default();
        let record = DeviceRecord {
            name: "r1".into(),
            host: "10.0.0.1".into(),
            port: 2222,
            device_type: "arista_eos".into(),
            credential_name: "lab".into(),
            jumphost_profile: Some("b1".into()),
            jumphost2_profile: Some("b2".into()),
            tags: ["edge", "core"].iter().map(|s| s.to_string()).collect(),
        };
        data.devices.insert("r1".into(), record.clone());

        let csv = export_devices(&data).unwrap();
        assert!(csv.starts_with("name,host,device_type,port"));
        assert!(csv.contains("\"core,edge\""));

        let outcome = parse_devices(csv.as_bytes()).unwrap();
        assert_eq!(outcome.records, vec![record]);
    }
}
