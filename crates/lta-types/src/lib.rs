//! Shared wire types for the Long Term Archive worker tier.
//!
//! These mirror the entities the LTA DB and File Catalog exchange with
//! workers over REST; they carry no behavior of their own.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub mod status {
    //! Known status strings. The LTA DB owns the full state machine; the
    //! worker tier only ever writes the values named here.
    pub const SPECIFIED: &str = "specified";
    pub const CREATED: &str = "created";
    pub const STAGED: &str = "staged";
    pub const LOCATED: &str = "located";
    pub const QUARANTINED: &str = "quarantined";
}

/// The five-key subset of a File Catalog record kept inside a [`Bundle`].
pub const CATALOG_PROJECTION_KEYS: [&str; 5] = [
    "checksum",
    "file_size",
    "logical_name",
    "meta_modify_date",
    "uuid",
];

/// A request to move files located under `path` at `source` to `dest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub uuid: String,
    pub source: String,
    pub dest: String,
    pub path: String,
    pub status: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub claimant: Option<String>,
    #[serde(default)]
    pub work_priority_timestamp: Option<String>,
}

/// One location a File Catalog record claims to exist at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub site: String,
    pub path: String,
    #[serde(default)]
    pub archive: Option<bool>,
    #[serde(default)]
    pub online: Option<bool>,
}

/// Metadata a later pipeline stage attaches to an archive object's own
/// catalog record, consumed read-only by the Locator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LtaMetadata {
    pub bundle_path: String,
    #[serde(default)]
    pub checksum: Option<serde_json::Value>,
}

/// A full File Catalog record, as returned by `GET /api/files/<uuid>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub uuid: String,
    pub logical_name: String,
    pub file_size: u64,
    #[serde(default)]
    pub checksum: Option<serde_json::Value>,
    #[serde(default)]
    pub meta_modify_date: Option<String>,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub lta: Option<LtaMetadata>,
}

/// The minimal five-key projection of a [`CatalogRecord`] carried forward
/// into `Bundle.files` / `Bundle.catalog`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProjection {
    pub checksum: Option<serde_json::Value>,
    pub file_size: u64,
    pub logical_name: String,
    pub meta_modify_date: Option<String>,
    pub uuid: String,
}

impl From<&CatalogRecord> for CatalogProjection {
    fn from(record: &CatalogRecord) -> Self {
        CatalogProjection {
            checksum: record.checksum.clone(),
            file_size: record.file_size,
            logical_name: record.logical_name.clone(),
            meta_modify_date: record.meta_modify_date.clone(),
            uuid: record.uuid.clone(),
        }
    }
}

/// A manifest describing a group of files that travel together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(rename = "type", default = "bundle_type")]
    pub kind: String,
    pub status: String,
    #[serde(default)]
    pub claimed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(default)]
    pub reason: String,
    pub request: String,
    pub source: String,
    pub dest: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<serde_json::Value>,
    #[serde(default)]
    pub files: Vec<CatalogProjection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<CatalogProjection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_priority_timestamp: Option<String>,
}

fn bundle_type() -> String {
    "Bundle".to_string()
}

/// Per-site parameters from the LTA site configuration file. Only
/// `bundle_size` is consumed by the core; everything else passes through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub bundle_size: u64,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// `{"sites": {"<name>": {...}, ...}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LtaSiteConfig {
    pub sites: HashMap<String, SiteConfig>,
}

/// A single entry in a File Catalog page response, `GET /api/files?...`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRef {
    pub uuid: String,
}

/// Builds the claimant identifier `"<name>-<instance_uuid>"` sent to the
/// LTA DB with every pop request.
pub fn claimant(name: &str, instance_uuid: &uuid::Uuid) -> String {
    format!("{name}-{instance_uuid}")
}

/// Builds a quarantine reason matching `^BY:[^ ]+ REASON:.+`.
pub fn quarantine_reason(claimant: &str, reason: &str) -> String {
    format!("BY:{claimant} REASON:{reason}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarantine_reason_matches_contract() {
        let reason = quarantine_reason("picker-abc123", "File Catalog returned zero files");
        assert!(reason.starts_with("BY:picker-abc123 REASON:"));
        let space_at = reason.find(' ').unwrap();
        assert_eq!(&reason[..space_at], "BY:picker-abc123");
    }

    #[test]
    fn bundle_defaults_type_to_bundle() {
        let json = serde_json::json!({
            "status": "specified",
            "request": "tr-1",
            "source": "WIPAC",
            "dest": "NERSC",
            "path": "/data/exp",
        });
        let bundle: Bundle = serde_json::from_value(json).unwrap();
        assert_eq!(bundle.kind, "Bundle");
        assert!(!bundle.claimed);
        assert!(bundle.files.is_empty());
    }

    #[test]
    fn catalog_projection_keeps_five_keys() {
        let record = CatalogRecord {
            uuid: "u1".into(),
            logical_name: "/data/exp/a.dat".into(),
            file_size: 42,
            checksum: Some(serde_json::json!({"sha512": "deadbeef"})),
            meta_modify_date: Some("2021-01-01T00:00:00".into()),
            locations: vec![],
            lta: None,
        };
        let projection = CatalogProjection::from(&record);
        assert_eq!(projection.uuid, "u1");
        assert_eq!(projection.file_size, 42);
    }
}
