//! Locator binary entrypoint.

use std::process::ExitCode;

use lta_worker::config::LocatorConfig;
use lta_worker::locator::Locator;
use lta_worker::runtime::WorkerRuntime;
use lta_worker::{logging, Worker};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match LocatorConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(1);
        }
    };

    logging::init("Locator", &config.common.component_name);
    let common = config.common.clone();
    common.log_resolved(&[
        ("SOURCE_SITE", config.source_site.clone()),
        ("DEST_SITE", config.dest_site.clone()),
        ("FILE_CATALOG_REST_URL", config.file_catalog_rest_url.to_string()),
    ]);

    let locator = Locator::new(config);
    tracing::info!(instance_uuid = %locator.identity().instance_uuid, "starting Locator");

    let runtime = WorkerRuntime::new(locator, common);
    let cancel = CancellationToken::new();
    run_until_signaled(&runtime, cancel).await;
    ExitCode::SUCCESS
}

async fn run_until_signaled(runtime: &WorkerRuntime<Locator>, cancel: CancellationToken) {
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
