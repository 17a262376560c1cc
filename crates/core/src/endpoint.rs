//! DNS-based endpoint selection
//!
//! Caches are often published behind DNS round robin. Resolving the name
//! ourselves and shuffling the answers spreads load across replicas.

use std::collections::HashSet;
use std::fmt;
use std::net::{IpAddr, ToSocketAddrs};

use rand::Rng;
use rand::seq::SliceRandom;

/// One resolved address of a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedAddress(IpAddr);

impl ResolvedAddress {
    pub fn ip(&self) -> IpAddr {
        self.0
    }

    pub fn is_ipv4(&self) -> bool {
        self.0.is_ipv4()
    }
}

/// IPv6 addresses render bracketed so they can be embedded in a URL
impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            IpAddr::V4(v4) => write!(f, "{v4}"),
            IpAddr::V6(v6) => write!(f, "[{v6}]"),
        }
    }
}

/// Resolves hostnames into a preference-ordered list of addresses
#[derive(Debug, Clone, Copy, Default)]
pub struct EndpointSelector;

impl EndpointSelector {
    pub fn new() -> Self {
        Self
    }

    /// Resolve `hostname`, IPv4 first, each family shuffled
    ///
    /// Lookup failures are logged and produce an empty list; callers should
    /// then fall back to using the hostname directly.
    pub fn resolve(&self, hostname: &str) -> Vec<ResolvedAddress> {
        let addresses = match (hostname, 0u16).to_socket_addrs() {
            Ok(iter) => iter.map(|sa| sa.ip()).collect::<Vec<_>>(),
            Err(e) => {
                tracing::error!(host = hostname, error = %e, "Unable to look up host");
                return Vec::new();
            }
        };

        order_addresses(addresses, &mut rand::thread_rng())
    }
}

/// Partition by family, dedupe, shuffle each family, and put IPv4 first
pub fn order_addresses<R: Rng + ?Sized>(addresses: Vec<IpAddr>, rng: &mut R) -> Vec<ResolvedAddress> {
    let mut seen = HashSet::new();
    let mut ipv4 = Vec::new();
    let mut ipv6 = Vec::new();

    for addr in addresses {
        let addr = addr.to_canonical();
        if !seen.insert(addr) {
            continue;
        }
        if addr.is_ipv4() {
            ipv4.push(ResolvedAddress(addr));
        } else {
            ipv6.push(ResolvedAddress(addr));
        }
    }

    ipv4.shuffle(rng);
    ipv6.shuffle(rng);

    ipv4.extend(ipv6);
    ipv4
}
