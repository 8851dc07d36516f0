//! The generic Worker Runtime: identity, the heartbeat/work cooperative
//! loops, and the claim-drain/quarantine primitives shared by Picker,
//! Locator, and Rucio Stager.
//!
//! Each loop is a `tokio::select!` between a `CancellationToken` and a
//! timed body, with `tokio::time::timeout` wrapping the idle sleep so a
//! shutdown signal interrupts it promptly.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lta_client::LtaDbClient;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::CommonConfig;

/// A worker's stable identity: role name, operator-supplied label, and a
/// random instance id regenerated on every process start. The LTA DB's
/// reaper relies on this to distinguish a restarted worker from the old
/// one, so it must never be persisted.
#[derive(Debug, Clone)]
pub struct WorkerIdentity {
    pub name: &'static str,
    pub component_name: String,
    pub instance_uuid: Uuid,
}

impl WorkerIdentity {
    pub fn new(name: &'static str, component_name: String) -> Self {
        WorkerIdentity {
            name,
            component_name,
            instance_uuid: Uuid::new_v4(),
        }
    }

    /// The claimant identifier sent with every pop request.
    pub fn claimant(&self) -> String {
        lta_types::claimant(self.name, &self.instance_uuid)
    }
}

/// Implemented by Picker, Locator, and Rucio Stager. `do_work_claim` claims
/// at most one entity and processes it to completion, returning whether
/// there is more work to drain (`Ok(true)`) or the worker should sleep
/// (`Ok(false)`). An `Err` means the active entity could not be fully
/// handled even after quarantining it; the runtime logs it as a fault and
/// stops draining, matching the work loop's "log with stack and continue"
/// contract.
#[async_trait::async_trait]
pub trait Worker: Send + Sync {
    fn identity(&self) -> &WorkerIdentity;

    async fn do_work_claim(&self) -> anyhow::Result<bool>;

    /// Component-specific heartbeat extensions. The core components
    /// contribute none.
    fn extra_status(&self) -> serde_json::Value {
        json!({})
    }
}

#[derive(Default)]
struct WorkTimestamps {
    last_work_begin: Option<DateTime<Utc>>,
    last_work_end: Option<DateTime<Utc>>,
}

/// Runs a [`Worker`]'s heartbeat loop and work loop concurrently until
/// `cancel` fires.
pub struct WorkerRuntime<W: Worker> {
    component: W,
    common: CommonConfig,
    lta_db: Arc<LtaDbClient>,
    times: Arc<std::sync::Mutex<WorkTimestamps>>,
}

impl<W: Worker> WorkerRuntime<W> {
    pub fn new(component: W, common: CommonConfig) -> Self {
        let lta_db = Arc::new(LtaDbClient::new(
            common.lta_rest_url.clone(),
            common.lta_rest_token.clone(),
            common.heartbeat_patch_timeout,
            common.heartbeat_patch_retries,
        ));
        WorkerRuntime {
            component,
            common,
            lta_db,
            times: Arc::new(std::sync::Mutex::new(WorkTimestamps::default())),
        }
    }

    pub fn component(&self) -> &W {
        &self.component
    }

    /// Runs both loops inside one `component_type`/`component_name`/
    /// `instance_uuid` span, so every event logged from here on down — pop/
    /// claim, quarantine, retry, heartbeat — inherits those fields (§6)
    /// without each call site threading them through explicitly.
    pub async fn run(&self, cancel: CancellationToken) {
        let identity = self.component.identity();
        let span = tracing::info_span!(
            "worker",
            component_type = identity.name,
            component_name = %identity.component_name,
            instance_uuid = %identity.instance_uuid,
        );
        tokio::join!(
            self.heartbeat_loop(cancel.clone()).instrument(span.clone()),
            self.work_loop(cancel).instrument(span)
        );
    }

    async fn heartbeat_loop(&self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = self.publish_heartbeat() => {}
            }
            if sleep_or_cancelled(self.common.heartbeat_sleep_duration, &cancel).await {
                return;
            }
        }
    }

    async fn publish_heartbeat(&self) {
        let identity = self.component.identity();
        let (begin, end) = {
            let times = self.times.lock().expect("work timestamps mutex poisoned");
            (times.last_work_begin, times.last_work_end)
        };
        let status = json!({
            "name": identity.name,
            "instance_uuid": identity.instance_uuid.to_string(),
            "component_name": identity.component_name,
            "timestamp": Utc::now().to_rfc3339(),
            "last_work_begin_timestamp": begin.map(|t| t.to_rfc3339()),
            "last_work_end_timestamp": end.map(|t| t.to_rfc3339()),
        });
        let status = merge_json(status, self.component.extra_status());
        if let Err(err) = self.lta_db.post_heartbeat(identity.name, status).await {
            tracing::error!(error = %err, "failed to publish heartbeat, will retry next tick");
        }
    }

    async fn work_loop(&self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = self.drain() => {}
            }
            if self.common.run_once_and_die {
                return;
            }
            if sleep_or_cancelled(self.common.work_sleep_duration, &cancel).await {
                return;
            }
        }
    }

    async fn drain(&self) {
        tracing::info!("starting work cycle");
        let mut claimed = true;
        while claimed {
            {
                let mut times = self.times.lock().expect("work timestamps mutex poisoned");
                times.last_work_begin = Some(Utc::now());
            }
            let result = self.component.do_work_claim().await;
            {
                let mut times = self.times.lock().expect("work timestamps mutex poisoned");
                times.last_work_end = Some(Utc::now());
            }
            claimed = match result {
                Ok(more) => more,
                Err(err) => {
                    tracing::error!(error = format!("{err:#}"), "work cycle faulted, entity was quarantined");
                    false
                }
            };
            claimed = claimed && !self.common.run_once_and_die;
        }
        tracing::info!("ending work cycle");
    }
}

/// Sleeps for `duration`, returning early (and reporting `true`) if `cancel`
/// fires first.
async fn sleep_or_cancelled(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::time::timeout(duration, cancel.cancelled()).await.is_ok()
}

fn merge_json(mut base: serde_json::Value, extra: serde_json::Value) -> serde_json::Value {
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (key, value) in extra_obj {
            base_obj.insert(key.clone(), value.clone());
        }
    }
    base
}

/// `quarantine(entity_kind, entity_uuid, reason)`: PATCHes `status=quarantined`
/// with a reason matching `^BY:<claimant> REASON:.+` and a refreshed
/// `work_priority_timestamp`. Failure to quarantine is logged at error level
/// and swallowed — the entity remains claimed and ages out via a separate
/// reaper.
pub async fn quarantine_transfer_request(
    lta_db: &LtaDbClient,
    claimant: &str,
    uuid: &str,
    reason: &str,
) {
    tracing::error!(uuid, reason, "sending TransferRequest to quarantine");
    let patch = json!({
        "status": lta_types::status::QUARANTINED,
        "reason": lta_types::quarantine_reason(claimant, reason),
        "work_priority_timestamp": Utc::now().to_rfc3339(),
    });
    if let Err(err) = lta_db.patch_transfer_request(uuid, patch).await {
        tracing::error!(uuid, error = %err, "unable to quarantine TransferRequest");
    }
}

pub async fn quarantine_bundle(lta_db: &LtaDbClient, claimant: &str, uuid: &str, reason: &str) {
    tracing::error!(uuid, reason, "sending Bundle to quarantine");
    let patch = json!({
        "status": lta_types::status::QUARANTINED,
        "reason": lta_types::quarantine_reason(claimant, reason),
        "work_priority_timestamp": Utc::now().to_rfc3339(),
    });
    if let Err(err) = lta_db.patch_bundle(uuid, patch).await {
        tracing::error!(uuid, error = %err, "unable to quarantine Bundle");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claimant_format_matches_contract() {
        let identity = WorkerIdentity::new("picker", "picker-east-1".to_string());
        let claimant = identity.claimant();
        assert!(claimant.starts_with("picker-"));
        assert!(claimant.contains(&identity.instance_uuid.to_string()));
    }

    #[test]
    fn identity_generates_fresh_instance_uuid_each_time() {
        let a = WorkerIdentity::new("locator", "a".to_string());
        let b = WorkerIdentity::new("locator", "a".to_string());
        assert_ne!(a.instance_uuid, b.instance_uuid);
    }
}
