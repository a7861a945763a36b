//! Typed keepalived configuration snapshot.

/// Service annotation carrying the VIP address.
pub const VIP_ANNOTATION: &str = "failover/vip";

/// Service annotation carrying the virtual router id (1-255).
pub const VRID_ANNOTATION: &str = "failover/virtual-router-id";

/// Service annotation naming the interface the VIP is configured on.
pub const INTERFACE_ANNOTATION: &str = "failover/interface";

/// Service annotation naming the interface keepalived tracks for link state.
pub const TRACK_INTERFACE_ANNOTATION: &str = "failover/track-interface";

/// One fetch's worth of keepalived configuration.
///
/// Immutable once assembled; the reconciliation loop replaces the whole
/// value when the backend view changes. Derived equality is deep and
/// field-complete, order-sensitive on `neighbors`; it is what decides
/// whether a tick rewrites the config file and reloads the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSnapshot {
    /// Interface the VIP floats on.
    pub interface: String,

    /// Interface keepalived tracks for link health.
    pub track_interface: String,

    /// This replica's own address, used as the unicast source.
    pub self_address: String,

    /// The floating virtual IP.
    pub vip: String,

    /// VRRP virtual router id shared by the peer group.
    pub virtual_router_id: u8,

    /// Unicast peers in canonical order, self excluded.
    pub neighbors: Vec<String>,

    /// This replica's derived VRRP priority.
    pub priority: u8,
}

impl ConfigSnapshot {
    /// Whether `next` differs from the previously rendered snapshot.
    ///
    /// `None` means nothing has been rendered yet, which always counts
    /// as changed. A false negative here would wedge the daemon on stale
    /// config, so comparison is full structural equality, nothing less.
    pub fn changed(prev: Option<&ConfigSnapshot>, next: &ConfigSnapshot) -> bool {
        prev != Some(next)
    }
}
