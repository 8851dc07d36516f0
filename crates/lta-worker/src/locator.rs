//! Locator: the inverse of Picker for restoration. Translates an inbound
//! `TransferRequest` into one or more `located` `Bundle`s that already
//! exist as archive objects at the remote site (§4.3).

use lta_client::{FileCatalogClient, LtaDbClient};
use lta_types::{Bundle, CatalogRecord, TransferRequest};
use serde_json::json;

use crate::config::LocatorConfig;
use crate::error::WorkError;
use crate::runtime::{quarantine_transfer_request, Worker, WorkerIdentity};

pub struct Locator {
    identity: WorkerIdentity,
    config: LocatorConfig,
    lta_db: LtaDbClient,
    file_catalog: FileCatalogClient,
}

impl Locator {
    pub fn new(config: LocatorConfig) -> Self {
        let identity = WorkerIdentity::new("locator", config.common.component_name.clone());
        let lta_db = LtaDbClient::new(
            config.common.lta_rest_url.clone(),
            config.common.lta_rest_token.clone(),
            config.common.work_timeout,
            config.common.work_retries,
        );
        let file_catalog = FileCatalogClient::new(
            config.file_catalog_rest_url.clone(),
            config.file_catalog_rest_token.clone(),
            config.common.work_timeout,
            config.common.work_retries,
        );
        Locator {
            identity,
            config,
            lta_db,
            file_catalog,
        }
    }

    async fn process_transfer_request(&self, tr: &TransferRequest) -> Result<(), WorkError> {
        tracing::info!(
            uuid = %tr.uuid, path = %tr.path, source = %tr.source,
            "asking the File Catalog about files archived at source"
        );
        let query = json!({
            "locations.archive": { "$eq": true },
            "locations.site": { "$eq": tr.source },
            "logical_name": { "$regex": format!("^{}", tr.path) },
        });
        let uuids = self.file_catalog.query_all_uuids(&query.to_string()).await?;
        tracing::info!(count = uuids.len(), "File Catalog returned file(s) to process");

        if uuids.is_empty() {
            return Err(WorkError::Data(
                "File Catalog returned zero files for the TransferRequest".to_string(),
            ));
        }

        let mut records: Vec<CatalogRecord> = Vec::with_capacity(uuids.len());
        for uuid in &uuids {
            records.push(self.file_catalog.get_file_record(uuid).await?);
        }

        let bundle_uuids = unique_archive_bundle_uuids(&records, &tr.source)?;

        let mut bundle_records = Vec::with_capacity(bundle_uuids.len());
        for bundle_uuid in &bundle_uuids {
            bundle_records.push(self.file_catalog.get_file_record(bundle_uuid).await?);
        }

        tracing::info!(bundles = bundle_records.len(), "creating new Bundles in the LTA DB");
        for bundle_record in bundle_records {
            let lta = bundle_record.lta.as_ref().ok_or_else(|| {
                WorkError::Data(format!(
                    "archive record {} has no 'lta' metadata",
                    bundle_record.uuid
                ))
            })?;
            let bundle = Bundle {
                uuid: None,
                kind: "Bundle".to_string(),
                status: lta_types::status::LOCATED.to_string(),
                claimed: false,
                verified: Some(false),
                reason: String::new(),
                request: tr.uuid.clone(),
                source: tr.source.clone(),
                dest: tr.dest.clone(),
                path: tr.path.clone(),
                size: Some(bundle_record.file_size),
                bundle_path: Some(lta.bundle_path.clone()),
                checksum: lta.checksum.clone(),
                files: vec![],
                catalog: Some((&bundle_record).into()),
                create_timestamp: None,
                update_timestamp: None,
                work_priority_timestamp: None,
            };
            self.lta_db.bulk_create_bundles(vec![bundle]).await?;
        }
        Ok(())
    }
}

/// Step 3 (§4.3): for each record, a location *participates* iff
/// `location.archive == Some(true)` and `location.site == source`. The
/// participating path is split once on `":"`, the kept portion's basename
/// is split on the first `"."`, and that prefix is the bundle uuid.
/// Distinct uuids are returned in first-seen order.
///
/// Resolves the spec's open question about non-hex prefixes: a prefix that
/// is not a bare 32-hex-digit uuid is rejected as [`WorkError::Data`] rather
/// than silently carried forward.
fn unique_archive_bundle_uuids(records: &[CatalogRecord], source: &str) -> Result<Vec<String>, WorkError> {
    let mut bundle_uuids = Vec::new();
    for record in records {
        for location in &record.locations {
            if location.archive != Some(true) || location.site != source {
                continue;
            }
            let keep_path = location.path.split(':').next().unwrap_or(&location.path);
            let basename = keep_path.rsplit('/').next().unwrap_or(keep_path);
            let prefix = basename.split('.').next().unwrap_or(basename);
            if !is_bare_hex_uuid(prefix) {
                return Err(WorkError::Data(format!(
                    "archive path {} has a malformed bundle filename prefix {prefix:?}",
                    location.path
                )));
            }
            if !bundle_uuids.iter().any(|u: &String| u == prefix) {
                tracing::info!(uuid = prefix, "found unique bundle UUID");
                bundle_uuids.push(prefix.to_string());
            }
        }
    }
    Ok(bundle_uuids)
}

fn is_bare_hex_uuid(candidate: &str) -> bool {
    candidate.len() == 32 && candidate.chars().all(|c| c.is_ascii_hexdigit())
}

#[async_trait::async_trait]
impl Worker for Locator {
    fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    async fn do_work_claim(&self) -> anyhow::Result<bool> {
        let claimant = self.identity.claimant();
        tracing::info!("asking the LTA DB for a TransferRequest to work on");
        let query = format!(
            "dest={}&source={}",
            urlencoding::encode(&self.config.dest_site),
            urlencoding::encode(&self.config.source_site),
        );
        let tr = self.lta_db.pop_transfer_request(&query, &claimant).await?;
        let Some(tr) = tr else {
            tracing::info!("LTA DB did not provide a TransferRequest to work on, going on vacation");
            return Ok(false);
        };

        // Unlike Picker, the Locator re-raises after quarantining: the work
        // loop logs this as a fault rather than a quiet idle cycle (§4.3, §9).
        match self.process_transfer_request(&tr).await {
            Ok(()) => Ok(true),
            Err(err) => {
                quarantine_transfer_request(&self.lta_db, &claimant, &tr.uuid, &err.to_string()).await;
                Err(anyhow::Error::from(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lta_types::Location;

    fn record_with_archive_location(path: &str, site: &str) -> CatalogRecord {
        CatalogRecord {
            uuid: "ignored".to_string(),
            logical_name: "/data/exp/a".to_string(),
            file_size: 1,
            checksum: None,
            meta_modify_date: None,
            locations: vec![Location {
                site: site.to_string(),
                path: path.to_string(),
                archive: Some(true),
                online: Some(false),
            }],
            lta: None,
        }
    }

    #[test]
    fn dedupes_bundle_uuids_in_first_seen_order() {
        let records = vec![
            record_with_archive_location(
                "/a/b/9a1cab0a395211eab1cbce3a3da73f88.zip:inner-1",
                "WIPAC",
            ),
            record_with_archive_location(
                "/a/b/9a1cab0a395211eab1cbce3a3da73f88.zip:inner-2",
                "WIPAC",
            ),
            record_with_archive_location(
                "/a/b/8abe369e59a111ea81bb534d1a62b1fe.zip:inner-3",
                "WIPAC",
            ),
        ];
        let uuids = unique_archive_bundle_uuids(&records, "WIPAC").unwrap();
        assert_eq!(
            uuids,
            vec![
                "9a1cab0a395211eab1cbce3a3da73f88".to_string(),
                "8abe369e59a111ea81bb534d1a62b1fe".to_string(),
            ]
        );
    }

    #[test]
    fn skips_locations_missing_archive_key_or_wrong_site() {
        let mut not_archived = record_with_archive_location("/a/b/c.zip:x", "WIPAC");
        not_archived.locations[0].archive = None;
        let wrong_site = record_with_archive_location("/a/b/d.zip:x", "NERSC");
        let uuids = unique_archive_bundle_uuids(&[not_archived, wrong_site], "WIPAC").unwrap();
        assert!(uuids.is_empty());
    }

    #[test]
    fn rejects_non_hex_bundle_prefix() {
        let record = record_with_archive_location("/a/b/not-a-uuid.zip:x", "WIPAC");
        let result = unique_archive_bundle_uuids(&[record], "WIPAC");
        assert!(result.is_err());
    }
}
