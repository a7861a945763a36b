//! Integration tests for the keepalived supervisor.
//!
//! A scripted shell process stands in for the real daemon so the state
//! machine can be exercised without root or a keepalived install.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vip_manager::config::KeepalivedSettings;
use vip_manager::{DaemonState, Keepalived};

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn settings(dir: &Path, binary: &Path) -> KeepalivedSettings {
    KeepalivedSettings {
        binary: binary.display().to_string(),
        config_path: dir.join("keepalived.conf"),
        ip_binary: "true".to_string(),
        stop_timeout: Duration::from_secs(2),
    }
}

#[tokio::test]
async fn test_daemon_lifecycle_start_ready_reload_stop() {
    let dir = tempfile::tempdir().unwrap();
    // Ignores its arguments and SIGHUP, like a daemon that reloads.
    let script = write_script(
        dir.path(),
        "fake-daemon.sh",
        "#!/bin/sh\ntrap '' HUP\nwhile :; do sleep 1; done\n",
    );
    let mut daemon = Keepalived::new(settings(dir.path(), &script));

    assert_eq!(daemon.state(), DaemonState::NotStarted);

    daemon.start().await.unwrap();
    assert_eq!(daemon.state(), DaemonState::Starting);

    let cancel = CancellationToken::new();
    let ready = tokio::time::timeout(Duration::from_secs(5), daemon.wait_ready(&cancel))
        .await
        .expect("readiness poll timed out")
        .unwrap();
    assert!(ready);
    assert_eq!(daemon.state(), DaemonState::Running);

    // Give the script a moment to install its HUP trap.
    tokio::time::sleep(Duration::from_millis(200)).await;
    daemon.reload().await.unwrap();

    daemon.stop(None).await.unwrap();
    assert_eq!(daemon.state(), DaemonState::Stopped);

    // Second stop is a no-op.
    daemon.stop(None).await.unwrap();
}

#[tokio::test]
async fn test_wait_ready_reports_daemon_that_exits_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "failing-daemon.sh", "#!/bin/sh\nexit 3\n");
    let mut daemon = Keepalived::new(settings(dir.path(), &script));

    daemon.start().await.unwrap();

    // Let the child exit before the first readiness poll runs.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let cancel = CancellationToken::new();
    match daemon.wait_ready(&cancel).await {
        Err(e) => assert!(e.to_string().contains("exited during startup")),
        Ok(ready) => panic!("expected startup failure, got ready={ready}"),
    }
    assert_eq!(daemon.state(), DaemonState::Stopped);
}

#[tokio::test]
async fn test_stop_kills_daemon_that_ignores_sigterm() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        "stubborn-daemon.sh",
        "#!/bin/sh\ntrap '' TERM\nwhile :; do sleep 1; done\n",
    );
    let mut stubborn = settings(dir.path(), &script);
    stubborn.stop_timeout = Duration::from_millis(300);
    let mut daemon = Keepalived::new(stubborn);

    daemon.start().await.unwrap();
    let cancel = CancellationToken::new();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(daemon.wait_ready(&cancel).await.unwrap());

    // SIGTERM is trapped; the bounded wait must escalate to SIGKILL
    // instead of hanging.
    tokio::time::timeout(Duration::from_secs(5), daemon.stop(None))
        .await
        .expect("stop did not finish")
        .unwrap();
    assert_eq!(daemon.state(), DaemonState::Stopped);
}
