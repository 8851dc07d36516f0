//! Rucio Stager: admission-control gate between the bundler's outbox and
//! the local Rucio RSE ingest directory.

use std::path::Path;

use chrono::Utc;
use lta_client::LtaDbClient;
use lta_types::Bundle;
use serde_json::json;
use walkdir::WalkDir;

use crate::config::StagerConfig;
use crate::error::WorkError;
use crate::runtime::{quarantine_bundle, Worker, WorkerIdentity};

pub struct RucioStager {
    identity: WorkerIdentity,
    config: StagerConfig,
    lta_db: LtaDbClient,
}

impl RucioStager {
    pub fn new(config: StagerConfig) -> Self {
        let identity = WorkerIdentity::new("rucio_stager", config.common.component_name.clone());
        let lta_db = LtaDbClient::new(
            config.common.lta_rest_url.clone(),
            config.common.lta_rest_token.clone(),
            config.common.work_timeout,
            config.common.work_retries,
        );
        RucioStager {
            identity,
            config,
            lta_db,
        }
    }

    /// Recursively walk `path`, summing the size of every regular file.
    fn enumerate_size(path: &str) -> std::io::Result<u64> {
        let mut total = 0u64;
        for entry in WalkDir::new(path).into_iter() {
            let entry = entry.map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::Other, format!("walking {path}: {e}"))
            })?;
            if entry.file_type().is_file() {
                total += entry.metadata()?.len();
            }
        }
        Ok(total)
    }

    async fn stage_bundle(&self, bundle: &Bundle) -> Result<bool, WorkError> {
        let bundle_id = bundle.uuid.as_deref().unwrap_or_default();
        let rucio_size = Self::enumerate_size(&self.config.rucio_inbox_path)?;
        let bundle_size = bundle.size.unwrap_or(0);
        let total_size = rucio_size + bundle_size;

        tracing::info!(bundle_size, rucio_size, dest_quota = self.config.dest_quota, "checking quota");
        if total_size > self.config.dest_quota {
            tracing::info!(
                "staging Bundle {bundle_id} to Rucio would exceed the configured quota; \
                 will unclaim and stage later"
            );
            self.unclaim_bundle(bundle_id).await?;
            return Ok(false);
        }

        let bundle_path = bundle
            .bundle_path
            .as_deref()
            .ok_or_else(|| WorkError::Data(format!("Bundle {bundle_id} has no bundle_path")))?;
        let bundle_name = Path::new(bundle_path)
            .file_name()
            .ok_or_else(|| WorkError::Data(format!("Bundle {bundle_id} bundle_path has no file name")))?;
        let src_path = Path::new(&self.config.bundler_outbox_path).join(bundle_name);
        let dst_path = Path::new(&self.config.rucio_inbox_path).join(bundle_name);

        tracing::info!(src = %src_path.display(), dst = %dst_path.display(), "moving Bundle");
        atomic_move(&src_path, &dst_path)?;

        let patch = json!({
            "bundle_path": dst_path.to_string_lossy(),
            "claimed": false,
            "status": lta_types::status::STAGED,
            "reason": "",
            "update_timestamp": Utc::now().to_rfc3339(),
        });
        self.lta_db.patch_bundle(bundle_id, patch).await?;
        Ok(true)
    }

    async fn unclaim_bundle(&self, bundle_id: &str) -> Result<(), WorkError> {
        let now = Utc::now().to_rfc3339();
        let patch = json!({
            "claimed": false,
            "update_timestamp": now,
            "work_priority_timestamp": now,
        });
        self.lta_db.patch_bundle(bundle_id, patch).await?;
        Ok(())
    }
}

/// Renames `src` to `dst` within one filesystem; falls back to copy-then-
/// delete across filesystems.
fn atomic_move(src: &Path, dst: &Path) -> std::io::Result<()> {
    match std::fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(src, dst)?;
            std::fs::remove_file(src)
        }
    }
}

#[async_trait::async_trait]
impl Worker for RucioStager {
    fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    async fn do_work_claim(&self) -> anyhow::Result<bool> {
        let claimant = self.identity.claimant();
        tracing::info!("asking the LTA DB for a Bundle to stage");
        let query = format!(
            "dest={}&status={}",
            urlencoding::encode(&self.config.dest_site),
            lta_types::status::CREATED
        );
        let bundle = self.lta_db.pop_bundle(&query, &claimant).await?;
        let Some(bundle) = bundle else {
            tracing::info!("LTA DB did not provide a Bundle to stage, going on vacation");
            return Ok(false);
        };

        let bundle_id = bundle.uuid.clone().unwrap_or_default();
        if let Err(err) = self.stage_bundle(&bundle).await {
            quarantine_bundle(&self.lta_db, &claimant, &bundle_id, &err.to_string()).await;
            return Err(anyhow::Error::from(err));
        }
        // Even on success, take a break between bundles: re-measure the
        // inbox fresh each cycle rather than staging a second bundle on top
        // of a stale measurement.
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile_free_fixtures::*;

    mod tempfile_free_fixtures {
        use std::path::PathBuf;

        /// A scratch directory under the system temp dir, removed on drop.
        pub struct ScratchDir(pub PathBuf);

        impl ScratchDir {
            pub fn new(name: &str) -> Self {
                let dir = std::env::temp_dir().join(format!("lta-stager-test-{name}-{}", std::process::id()));
                std::fs::create_dir_all(&dir).unwrap();
                ScratchDir(dir)
            }
        }

        impl Drop for ScratchDir {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.0);
            }
        }
    }

    #[test]
    fn enumerate_size_sums_nested_files() {
        let scratch = ScratchDir::new("enumerate");
        std::fs::write(scratch.0.join("a.txt"), b"12345").unwrap();
        let nested = scratch.0.join("nested");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("b.txt"), b"1234567890").unwrap();

        let size = RucioStager::enumerate_size(scratch.0.to_str().unwrap()).unwrap();
        assert_eq!(size, 15);
    }

    #[test]
    fn atomic_move_renames_within_same_filesystem() {
        let scratch = ScratchDir::new("move");
        let src = scratch.0.join("bundle.zip");
        let dst = scratch.0.join("staged.zip");
        std::fs::write(&src, b"bundle-contents").unwrap();

        atomic_move(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read(&dst).unwrap(), b"bundle-contents");
    }
}
