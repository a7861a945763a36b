//! vip-manager binary

use anyhow::Context;
use failover::{ConfigFetcher, HttpDiscovery};
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use vip_manager::{Controller, Keepalived, Renderer, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load settings first so logging can honor the configured level.
    let settings = Settings::load().context("failed to load settings")?;
    common::logging::init(settings.logging.format(), settings.logging.level());

    info!("vip-manager starting");

    let discovery = HttpDiscovery::new(&settings.discovery.endpoint)
        .context("failed to build discovery client")?;
    let fetcher = ConfigFetcher::new(
        Arc::new(discovery),
        &settings.discovery.service,
        &settings.discovery.instance,
    );
    let renderer = Renderer::new(&settings.keepalived.config_path);
    let daemon = Keepalived::new(settings.keepalived.clone());

    let mut controller = Controller::new(
        Arc::new(fetcher),
        Arc::new(renderer),
        Box::new(daemon),
        settings.controller.reconcile_interval,
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
        signal_cancel.cancel();
    });

    if let Err(e) = controller.run(cancel).await {
        // Teardown failures can mean a VIP left configured on the
        // interface; make that loud and visible in the exit status.
        error!(error = %e, "controller exited with error");
        return Err(e.into());
    }

    info!("vip-manager stopped");
    Ok(())
}
