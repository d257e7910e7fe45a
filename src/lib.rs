//! nss-dnd - a rule-driven NSS hosts backend
//!
//! This library builds `libnss_dnd.so.2`, a Name Service Switch module
//! glibc loads when `/etc/nsswitch.conf` lists `dnd` as a hosts source:
//!
//! ```text
//! hosts: files dnd dns
//! ```
//!
//! Lookups are answered from an ordered YAML rule set
//! (`/etc/nss_dnd_rules.yaml` by default, `NSS_DND_CONFIG_FILE_PATH` to
//! override) supporting fixed targets, HTTP endpoints, and cname
//! indirection. The file is re-read whenever its mtime advances.

pub mod config;
pub mod core;
pub mod hostent;
pub mod logging;
pub mod nss;
pub mod resolver;
pub mod rules;

// Re-export the core types for convenience
pub use crate::core::{AddressFamily, AddressList, HostRecord, HostResolver, ResolveError};
