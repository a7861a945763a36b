//! keepalived process supervision and VIP cleanup.

use crate::config::KeepalivedSettings;
use common::{Error, Result};
use failover::ConfigSnapshot;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How often to check whether the spawned daemon is up.
const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Supervisor state for the external daemon process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    /// No process has been launched yet.
    NotStarted,
    /// Process launched, not yet observed alive.
    Starting,
    /// Process observed alive; reloads are allowed.
    Running,
    /// Process terminated and VIP cleanup attempted.
    Stopped,
}

impl std::fmt::Display for DaemonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonState::NotStarted => write!(f, "NOT_STARTED"),
            DaemonState::Starting => write!(f, "STARTING"),
            DaemonState::Running => write!(f, "RUNNING"),
            DaemonState::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Owns the keepalived child process.
///
/// Exactly one task drives this type; `reload` and `stop` are never
/// called concurrently because the reconciliation loop is sequential.
pub struct Keepalived {
    settings: KeepalivedSettings,
    state: DaemonState,
    child: Option<Child>,
}

impl Keepalived {
    /// Create a supervisor. Nothing is spawned until `start`.
    pub fn new(settings: KeepalivedSettings) -> Self {
        Self {
            settings,
            state: DaemonState::NotStarted,
            child: None,
        }
    }

    /// Current supervisor state.
    pub fn state(&self) -> DaemonState {
        self.state
    }

    /// Launch the daemon in the background.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != DaemonState::NotStarted {
            return Err(Error::process(format!(
                "cannot start keepalived in state {}",
                self.state
            )));
        }

        let child = Command::new(&self.settings.binary)
            .arg("--dont-fork")
            .arg("--log-console")
            .arg("--log-detail")
            .arg("--release-vips")
            .arg("--use-file")
            .arg(&self.settings.config_path)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::process(format!(
                    "failed to launch {}: {e}",
                    self.settings.binary
                ))
            })?;

        info!(binary = %self.settings.binary, "launched keepalived");
        self.child = Some(child);
        self.state = DaemonState::Starting;
        Ok(())
    }

    /// Poll until the launched process is observed alive.
    ///
    /// Returns `false` when cancelled before readiness. A child that
    /// exits before it was ever observed alive is a process error; the
    /// first reload must not be issued against a dead daemon.
    pub async fn wait_ready(&mut self, cancel: &CancellationToken) -> Result<bool> {
        let mut poll = interval(READY_POLL_INTERVAL);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(false),
                _ = poll.tick() => {
                    let child = self
                        .child
                        .as_mut()
                        .ok_or_else(|| Error::process("keepalived was never started"))?;

                    if let Some(status) = child.try_wait()? {
                        self.state = DaemonState::Stopped;
                        return Err(Error::process(format!(
                            "keepalived exited during startup: {status}"
                        )));
                    }

                    if let Some(pid) = child.id() {
                        info!(pid, "keepalived is running");
                        self.state = DaemonState::Running;
                        return Ok(true);
                    }
                }
            }
        }
    }

    /// Signal the daemon to re-read its config file.
    pub async fn reload(&mut self) -> Result<()> {
        if self.state != DaemonState::Running {
            return Err(Error::process(format!(
                "cannot reload keepalived in state {}",
                self.state
            )));
        }

        let pid = self
            .child
            .as_ref()
            .and_then(|c| c.id())
            .ok_or_else(|| Error::process("keepalived process handle lost"))?;

        info!(pid, "reloading keepalived");
        signal::kill(Pid::from_raw(pid as i32), Signal::SIGHUP)
            .map_err(|e| Error::process(format!("failed to signal keepalived pid {pid}: {e}")))
    }

    /// Terminate the daemon and remove the VIP from the interface.
    ///
    /// Idempotent; a second call is a no-op. VIP removal runs whether or
    /// not termination went cleanly (the address must not outlive the
    /// controller) and its failure is the error surfaced to the caller.
    pub async fn stop(&mut self, active: Option<&ConfigSnapshot>) -> Result<()> {
        if self.state == DaemonState::Stopped {
            return Ok(());
        }
        self.state = DaemonState::Stopped;

        if let Some(mut child) = self.child.take() {
            self.terminate(&mut child).await;
        }

        match active {
            Some(snapshot) => self.remove_vip(&snapshot.interface, &snapshot.vip).await,
            None => Ok(()),
        }
    }

    async fn terminate(&self, child: &mut Child) {
        match child.try_wait() {
            Ok(Some(status)) => {
                info!(%status, "keepalived already exited");
                return;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "could not query keepalived state"),
        }

        if let Some(pid) = child.id() {
            if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                warn!(pid, error = %e, "failed to send SIGTERM to keepalived");
            }
        }

        match tokio::time::timeout(self.settings.stop_timeout, child.wait()).await {
            Ok(Ok(status)) => info!(%status, "keepalived terminated"),
            Ok(Err(e)) => warn!(error = %e, "failed to reap keepalived"),
            Err(_) => {
                warn!(
                    timeout = ?self.settings.stop_timeout,
                    "keepalived did not exit in time, killing"
                );
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill keepalived");
                }
            }
        }
    }

    /// Delete the VIP from the interface.
    ///
    /// Empty interface or VIP means nothing was ever configured, so
    /// there is nothing to remove; that is success, not an error.
    pub async fn remove_vip(&self, interface: &str, vip: &str) -> Result<()> {
        if interface.is_empty() || vip.is_empty() {
            return Ok(());
        }

        info!(vip, interface, "removing configured VIP");
        let output = Command::new(&self.settings.ip_binary)
            .args(["addr", "del", &format!("{vip}/32"), "dev", interface])
            .output()
            .await
            .map_err(|e| {
                Error::command(format!("failed to run {}: {e}", self.settings.ip_binary))
            })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(Error::command(format!(
                "ip addr del {vip} dev {interface} failed ({}): {}",
                output.status,
                combined.trim()
            )));
        }

        Ok(())
    }
}
