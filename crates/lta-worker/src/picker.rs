//! Picker: translates an outbound `TransferRequest` into one or more
//! `specified` `Bundle`s by querying the File Catalog and bin-packing the
//! matched files to the destination site's target bundle size (§4.2).

use std::fs;

use lta_client::{FileCatalogClient, LtaDbClient};
use lta_types::{Bundle, CatalogProjection, CatalogRecord, LtaSiteConfig, TransferRequest};
use serde_json::json;

use crate::config::PickerConfig;
use crate::error::WorkError;
use crate::packing::pack_constant_volume;
use crate::runtime::{quarantine_transfer_request, Worker, WorkerIdentity};

pub struct Picker {
    identity: WorkerIdentity,
    config: PickerConfig,
    lta_db: LtaDbClient,
    file_catalog: FileCatalogClient,
    sites: LtaSiteConfig,
}

impl Picker {
    pub fn new(config: PickerConfig) -> anyhow::Result<Self> {
        let identity = WorkerIdentity::new("picker", config.common.component_name.clone());
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
        let site_data = fs::read_to_string(&config.lta_site_config_path).map_err(|e| {
            anyhow::anyhow!("failed to read LTA_SITE_CONFIG at {}: {e}", config.lta_site_config_path)
        })?;
        let sites: LtaSiteConfig = serde_json::from_str(&site_data)
            .map_err(|e| anyhow::anyhow!("failed to parse LTA_SITE_CONFIG: {e}"))?;
        Ok(Picker {
            identity,
            config,
            lta_db,
            file_catalog,
            sites,
        })
    }

    async fn process_transfer_request(&self, tr: &TransferRequest) -> Result<(), WorkError> {
        tracing::info!(
            uuid = %tr.uuid, source = %tr.source, dest = %tr.dest, path = %tr.path,
            "processing TransferRequest"
        );

        // The query is intentionally redundant: it filters on both
        // locations.path and logical_name with the same prefix. Preserved
        // as-is; it under-matches if the warehouse and logical path ever
        // disagree (operators should be aware of this).
        let query = json!({
            "locations.site": { "$eq": tr.source },
            "locations.path": { "$regex": format!("^{}", tr.path) },
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

        let site = self.sites.sites.get(&tr.dest).ok_or_else(|| {
            WorkError::Data(format!("no site configuration entry for destination {}", tr.dest))
        })?;
        let packing_list: Vec<(u64, CatalogRecord)> =
            records.into_iter().map(|r| (r.file_size, r)).collect();
        let packing_spec = pack_constant_volume(packing_list, site.bundle_size);
        tracing::info!(bundles = packing_spec.len(), "checking bundle packing lists");

        for spec in &packing_spec {
            if spec.len() as u64 > self.config.max_file_count {
                return Err(WorkError::Data(format!(
                    "Bundle packing list contains {} files; MAX_FILE_COUNT is configured at {}",
                    spec.len(),
                    self.config.max_file_count
                )));
            }
        }

        tracing::info!(bundles = packing_spec.len(), "creating new Bundles in the LTA DB");
        for spec in packing_spec {
            let files: Vec<CatalogProjection> = spec.iter().map(|(_, record)| record.into()).collect();
            let bundle = Bundle {
                uuid: None,
                kind: "Bundle".to_string(),
                status: lta_types::status::SPECIFIED.to_string(),
                claimed: false,
                verified: None,
                reason: String::new(),
                request: tr.uuid.clone(),
                source: tr.source.clone(),
                dest: tr.dest.clone(),
                path: tr.path.clone(),
                size: None,
                bundle_path: None,
                checksum: None,
                files,
                catalog: None,
                create_timestamp: None,
                update_timestamp: None,
                work_priority_timestamp: None,
            };
            self.lta_db.bulk_create_bundles(vec![bundle]).await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Worker for Picker {
    fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    async fn do_work_claim(&self) -> anyhow::Result<bool> {
        let claimant = self.identity.claimant();
        tracing::info!("asking the LTA DB for a TransferRequest to work on");
        let query = format!("source={}", urlencoding::encode(&self.config.source_site));
        let tr = self.lta_db.pop_transfer_request(&query, &claimant).await?;
        let Some(tr) = tr else {
            tracing::info!("LTA DB did not provide a TransferRequest to work on, going on vacation");
            return Ok(false);
        };

        match self.process_transfer_request(&tr).await {
            Ok(()) => Ok(true),
            Err(err) => {
                tracing::warn!(error = %err, uuid = %tr.uuid, "error while processing TransferRequest");
                quarantine_transfer_request(&self.lta_db, &claimant, &tr.uuid, &err.to_string()).await;
                Ok(false)
            }
        }
    }
}
