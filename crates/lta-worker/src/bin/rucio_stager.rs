//! Rucio Stager binary entrypoint.

use std::process::ExitCode;

use lta_worker::config::StagerConfig;
use lta_worker::runtime::WorkerRuntime;
use lta_worker::stager::RucioStager;
use lta_worker::{logging, Worker};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match StagerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(1);
        }
    };

    logging::init("RucioStager", &config.common.component_name);
    let common = config.common.clone();
    common.log_resolved(&[
        ("DEST_SITE", config.dest_site.clone()),
        ("BUNDLER_OUTBOX_PATH", config.bundler_outbox_path.clone()),
        ("RUCIO_INBOX_PATH", config.rucio_inbox_path.clone()),
        ("DEST_QUOTA", config.dest_quota.to_string()),
    ]);

    let stager = RucioStager::new(config);
    tracing::info!(instance_uuid = %stager.identity().instance_uuid, "starting RucioStager");

    let runtime = WorkerRuntime::new(stager, common);
    let cancel = CancellationToken::new();
    run_until_signaled(&runtime, cancel).await;
    ExitCode::SUCCESS
}

async fn run_until_signaled(runtime: &WorkerRuntime<RucioStager>, cancel: CancellationToken) {
    let watcher = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        watcher.cancel();
    });
    runtime.run(cancel).await;
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
