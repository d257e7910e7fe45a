//! Core domain types and service traits for nss-dnd
//!
//! This module defines the fundamental data structures and the trait
//! contract between the NSS entry points and the resolution backend.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;

/// The address family of a lookup request or a resolved record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Byte width of one address of this family.
    pub fn width(self) -> usize {
        match self {
            AddressFamily::V4 => 4,
            AddressFamily::V6 => 16,
        }
    }
}

/// Addresses of a resolved record. All entries share one family, so a
/// record can never mix 4-byte and 16-byte addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressList {
    V4(Vec<Ipv4Addr>),
    V6(Vec<Ipv6Addr>),
}

impl AddressList {
    pub fn family(&self) -> AddressFamily {
        match self {
            AddressList::V4(_) => AddressFamily::V4,
            AddressList::V6(_) => AddressFamily::V6,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AddressList::V4(v) => v.len(),
            AddressList::V6(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collects the addresses of the requested family out of a mixed
    /// list, or `None` when no address of that family is present.
    pub fn of_family(addrs: &[IpAddr], family: AddressFamily) -> Option<Self> {
        match family {
            AddressFamily::V4 => {
                let v4: Vec<Ipv4Addr> = addrs
                    .iter()
                    .filter_map(|a| match a {
                        IpAddr::V4(v4) => Some(*v4),
                        IpAddr::V6(_) => None,
                    })
                    .collect();
                (!v4.is_empty()).then_some(AddressList::V4(v4))
            }
            AddressFamily::V6 => {
                let v6: Vec<Ipv6Addr> = addrs
                    .iter()
                    .filter_map(|a| match a {
                        IpAddr::V6(v6) => Some(*v6),
                        IpAddr::V4(_) => None,
                    })
                    .collect();
                (!v6.is_empty()).then_some(AddressList::V6(v6))
            }
        }
    }
}

/// A resolved host record, the backend's answer to one lookup.
///
/// Owned by the entry point for the duration of a single call and never
/// mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    /// The canonical host name.
    pub canonical_name: String,
    /// Alias names, in query order. May be empty.
    pub aliases: Vec<String>,
    /// The addresses, at least one, all of one family.
    pub addresses: AddressList,
}

impl HostRecord {
    pub fn family(&self) -> AddressFamily {
        self.addresses.family()
    }
}

/// Backend failures that are not a plain "no such host".
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// A temporary condition (timeout, endpoint unreachable); the caller
    /// may retry later.
    #[error("transient resolution failure: {0}")]
    Transient(String),

    /// A permanent or unexpected failure; surfaced as service-unavailable.
    #[error("resolution failed: {0}")]
    Failed(String),
}

// =============================================================================
// Service Traits
// =============================================================================

/// Resolves a host name to a record of addresses of one family.
///
/// Implementations must be safe to call concurrently from unrelated
/// threads: the NSS entry points run on whatever thread performs name
/// resolution, with no serialization above this trait. They must also
/// bound their own latency; the entry points impose no timeout.
///
/// # Returns
/// * `Ok(Some(HostRecord))` on a successful resolution
/// * `Ok(None)` when the backend has no record for the name
/// * `Err(ResolveError)` for transient or permanent backend failures
pub trait HostResolver: Send + Sync {
    fn resolve(
        &self,
        name: &str,
        family: AddressFamily,
    ) -> Result<Option<HostRecord>, ResolveError>;
}
