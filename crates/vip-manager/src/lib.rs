//! vip-manager - keepalived VIP controller
//!
//! Keeps a floating virtual IP assigned across a dynamic replica set by
//! reconciling service-discovery membership into keepalived configuration.
//! Each replica runs its own controller; priorities come out of the
//! deterministic derivation in the `failover` crate, so the replicas never
//! coordinate directly.
//!
//! # Components
//!
//! - **Renderer**: writes keepalived.conf atomically from a snapshot
//! - **Keepalived**: supervises the daemon process and cleans up the VIP
//! - **Controller**: the fetch/diff/render/reload reconciliation loop

pub mod config;
pub mod controller;
pub mod keepalived;
pub mod render;

pub use config::{ConfigError, Settings};
pub use controller::{ConfigWriter, Controller, DaemonControl, SnapshotSource};
pub use keepalived::{DaemonState, Keepalived};
pub use render::Renderer;
