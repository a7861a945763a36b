//! Reconciliation loop: fetch, diff, render, reload.

use crate::keepalived::Keepalived;
use crate::render::Renderer;
use async_trait::async_trait;
use common::Result;
use failover::{ConfigFetcher, ConfigSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Produces one configuration snapshot per tick.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<ConfigSnapshot>;
}

#[async_trait]
impl SnapshotSource for ConfigFetcher {
    async fn fetch(&self) -> Result<ConfigSnapshot> {
        ConfigFetcher::fetch(self).await
    }
}

/// Writes a snapshot to the daemon's config file.
#[async_trait]
pub trait ConfigWriter: Send + Sync {
    async fn write_config(&self, snapshot: &ConfigSnapshot) -> Result<()>;
}

#[async_trait]
impl ConfigWriter for Renderer {
    async fn write_config(&self, snapshot: &ConfigSnapshot) -> Result<()> {
        self.write(snapshot)
    }
}

/// Lifecycle surface of the supervised daemon.
#[async_trait]
pub trait DaemonControl: Send {
    async fn start(&mut self) -> Result<()>;

    /// Block until the daemon is observed alive, or cancellation.
    /// Returns `false` when cancelled first.
    async fn wait_ready(&mut self, cancel: &CancellationToken) -> Result<bool>;

    async fn reload(&mut self) -> Result<()>;

    /// Terminate and clean up the VIP named by the active snapshot.
    async fn stop(&mut self, active: Option<&ConfigSnapshot>) -> Result<()>;
}

#[async_trait]
impl DaemonControl for Keepalived {
    async fn start(&mut self) -> Result<()> {
        Keepalived::start(self).await
    }

    async fn wait_ready(&mut self, cancel: &CancellationToken) -> Result<bool> {
        Keepalived::wait_ready(self, cancel).await
    }

    async fn reload(&mut self) -> Result<()> {
        Keepalived::reload(self).await
    }

    async fn stop(&mut self, active: Option<&ConfigSnapshot>) -> Result<()> {
        Keepalived::stop(self, active).await
    }
}

/// Reconciles discovery state into daemon configuration.
///
/// Owns the active snapshot (the last one successfully rendered and
/// reloaded) and passes it explicitly to the diff and to teardown.
pub struct Controller {
    source: Arc<dyn SnapshotSource>,
    writer: Arc<dyn ConfigWriter>,
    daemon: Box<dyn DaemonControl>,
    period: Duration,
    active: Option<ConfigSnapshot>,
}

impl Controller {
    /// Create a controller ticking at the given period.
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        writer: Arc<dyn ConfigWriter>,
        daemon: Box<dyn DaemonControl>,
        period: Duration,
    ) -> Self {
        Self {
            source,
            writer,
            daemon,
            period,
            active: None,
        }
    }

    /// The last snapshot that was successfully rendered and reloaded.
    pub fn active(&self) -> Option<&ConfigSnapshot> {
        self.active.as_ref()
    }

    /// One reconciliation attempt.
    ///
    /// The active snapshot only advances after render and reload both
    /// succeed; any earlier failure leaves the previous baseline in
    /// place so the next tick retries the same transition.
    pub async fn sync(&mut self) -> Result<()> {
        let snapshot = self.source.fetch().await?;

        if !ConfigSnapshot::changed(self.active.as_ref(), &snapshot) {
            debug!("configuration unchanged, skipping render");
            return Ok(());
        }

        info!(
            priority = snapshot.priority,
            neighbors = snapshot.neighbors.len(),
            vip = %snapshot.vip,
            "configuration changed, updating daemon"
        );

        self.writer.write_config(&snapshot).await?;
        self.daemon.reload().await?;
        self.active = Some(snapshot);
        Ok(())
    }

    /// Run until the cancellation token fires.
    ///
    /// Launches the daemon, gates the first reconciliation on its
    /// readiness, then ticks. Per-tick failures are logged here and
    /// never abort the loop; the controller is built to run indefinitely
    /// and self-heal on the next successful fetch.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        self.daemon.start().await?;

        match self.daemon.wait_ready(&cancel).await {
            Ok(true) => {}
            Ok(false) => {
                info!("stop requested before keepalived became ready");
                return self.stop().await;
            }
            Err(e) => {
                if let Err(stop_err) = self.stop().await {
                    warn!(error = %stop_err, "cleanup after failed startup also failed");
                }
                return Err(e);
            }
        }

        let mut ticker = tokio::time::interval(self.period);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sync().await {
                        warn!(error = %e, "reconciliation failed, will retry next tick");
                    }
                }
            }
        }

        info!("stop requested, shutting down");
        self.stop().await
    }

    /// Synchronous teardown: stop the daemon and remove the VIP.
    ///
    /// A VIP-removal failure is returned to the caller, since it means
    /// an address may have leaked on the interface, but the daemon is
    /// already down by then and the process should still exit.
    pub async fn stop(&mut self) -> Result<()> {
        self.daemon.stop(self.active.as_ref()).await
    }
}
