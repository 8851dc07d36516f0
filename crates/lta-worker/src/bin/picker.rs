//! Picker binary entrypoint: configure from the environment and run until
//! signaled.

use std::process::ExitCode;

use lta_worker::config::PickerConfig;
use lta_worker::picker::Picker;
use lta_worker::runtime::WorkerRuntime;
use lta_worker::{logging, Worker};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match PickerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(1);
        }
    };

    logging::init("Picker", &config.common.component_name);
    let common = config.common.clone();
    common.log_resolved(&[
        ("SOURCE_SITE", config.source_site.clone()),
        ("FILE_CATALOG_REST_URL", config.file_catalog_rest_url.to_string()),
        ("LTA_SITE_CONFIG", config.lta_site_config_path.clone()),
        ("MAX_FILE_COUNT", config.max_file_count.to_string()),
    ]);

    let picker = match Picker::new(config) {
        Ok(picker) => picker,
        Err(err) => {
            tracing::error!(error = %err, "failed to initialize Picker");
            return ExitCode::from(1);
        }
    };
    tracing::info!(instance_uuid = %picker.identity().instance_uuid, "starting Picker");

    let runtime = WorkerRuntime::new(picker, common);
    let cancel = CancellationToken::new();
    run_until_signaled(&runtime, cancel).await;
    ExitCode::SUCCESS
}

async fn run_until_signaled(runtime: &WorkerRuntime<Picker>, cancel: CancellationToken) {
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
