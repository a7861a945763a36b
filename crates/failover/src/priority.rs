//! Deterministic priority and neighbor derivation.
//!
//! All replicas sort the same peer addresses the same way (plain
//! lexicographic comparison on the address string), so each one can
//! compute its own VRRP priority and everyone else's without talking to
//! anyone. Membership changes may shuffle existing priorities; the
//! daemon reload absorbs that.

/// Lowest priority handed out, for the rank-0 replica.
pub const PRIORITY_BASE: u8 = 100;

/// Highest priority keepalived accepts for a non-owner instance.
pub const PRIORITY_MAX: u8 = 254;

/// Result of a derivation for one replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
    /// Canonically ordered peer addresses, self excluded.
    pub neighbors: Vec<String>,
    /// VRRP priority for self. Strictly increases with canonical rank.
    pub priority: u8,
}

/// Derive the neighbor list and priority for `self_address` given the
/// observed peer set.
///
/// Peers are sorted lexicographically and de-duplicated before indexing,
/// so every replica sees the same canonical order regardless of how the
/// discovery source happened to return the set. A self address missing
/// from `peers` (discovery race on a freshly started replica) still gets
/// a valid rank: the position it would occupy in the canonical order.
pub fn derive(self_address: &str, peers: &[String]) -> Derivation {
    let mut ordered: Vec<String> = peers.to_vec();
    ordered.sort();
    ordered.dedup();

    let rank = match ordered.binary_search_by(|addr| addr.as_str().cmp(self_address)) {
        Ok(present) => present,
        Err(insertion_point) => insertion_point,
    };

    let neighbors = ordered
        .into_iter()
        .filter(|addr| addr != self_address)
        .collect();

    Derivation {
        neighbors,
        priority: rank_priority(rank),
    }
}

/// Map a canonical rank to a keepalived priority.
///
/// Ranks past keepalived's 8-bit priority space clamp to PRIORITY_MAX;
/// replica groups that large are outside the supported range.
fn rank_priority(rank: usize) -> u8 {
    let headroom = (PRIORITY_MAX - PRIORITY_BASE) as usize;
    PRIORITY_BASE + rank.min(headroom) as u8
}
