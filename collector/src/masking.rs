//! Client address anonymization
//!
//! When enabled, the collector coarsens client addresses before any event
//! is created: the host portion is zeroed so stored events identify a
//! network, not a machine.

use std::net::IpAddr;

/// Zero the host portion of a client address
///
/// IPv4 keeps the first three octets (a /24); IPv6 keeps the first three
/// segments (a /48).
pub fn mask_ip(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let [a, b, c, _] = v4.octets();
            IpAddr::from([a, b, c, 0])
        }
        IpAddr::V6(v6) => {
            let [a, b, c, ..] = v6.segments();
            IpAddr::from([a, b, c, 0, 0, 0, 0, 0])
        }
    }
}

/// Masking policy applied at the admission boundary
#[derive(Debug, Clone, Copy)]
pub struct MaskingPolicy {
    enabled: bool,
}

impl MaskingPolicy {
    /// Build a policy; a disabled policy passes addresses through untouched
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Apply the policy to an optional client address
    pub fn apply(&self, addr: Option<IpAddr>) -> Option<IpAddr> {
        if self.enabled {
            addr.map(mask_ip)
        } else {
            addr
        }
    }
}
