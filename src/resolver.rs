//! The rule-driven resolution backend.
//!
//! A [`RuleResolver`] evaluates the queried name against an immutable
//! rule-set snapshot: the first rule whose pattern matches and whose
//! action yields at least one address of the requested family produces
//! the record. `cname` rules restart evaluation at another name and turn
//! the names walked so far into aliases of the final record.

use crate::core::{AddressFamily, AddressList, HostRecord, HostResolver, ResolveError};
use crate::rules::{RuleAction, RuleSet};
use log::debug;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Longest permitted `cname` chain. Anything deeper is treated as a
/// configuration defect rather than followed forever.
const MAX_ALIAS_CHAIN: usize = 8;

/// Resolves names against one rule-set snapshot.
///
/// The snapshot is immutable for the resolver's lifetime; hot reload
/// happens by building a new resolver from a newer snapshot (see
/// [`crate::config::RuleStore`]).
pub struct RuleResolver {
    rules: Arc<RuleSet>,
    http_timeout: Duration,
}

impl RuleResolver {
    pub fn new(rules: Arc<RuleSet>, http_timeout: Duration) -> Self {
        Self {
            rules,
            http_timeout,
        }
    }

    fn eval(
        &self,
        name: &str,
        family: AddressFamily,
        chain: &mut Vec<String>,
    ) -> Result<Option<HostRecord>, ResolveError> {
        if chain.len() > MAX_ALIAS_CHAIN {
            return Err(ResolveError::Failed(format!(
                "alias chain starting at {:?} exceeds {} links",
                chain.first().map(String::as_str).unwrap_or(name),
                MAX_ALIAS_CHAIN
            )));
        }

        for rule in self.rules.matching(name) {
            match &rule.action {
                RuleAction::Static { targets } => {
                    if let Some(addresses) = AddressList::of_family(targets, family) {
                        return Ok(Some(Self::record(name, chain, addresses)));
                    }
                    // No address of the requested family; keep looking.
                }
                RuleAction::Api { endpoint } => {
                    if let Some(addrs) = self.query_endpoint(endpoint, name)? {
                        if let Some(addresses) = AddressList::of_family(&addrs, family) {
                            return Ok(Some(Self::record(name, chain, addresses)));
                        }
                    }
                }
                RuleAction::Cname { alias_to } => {
                    if alias_to == name {
                        continue;
                    }
                    if chain.iter().any(|seen| seen == alias_to) {
                        return Err(ResolveError::Failed(format!(
                            "alias cycle through {alias_to:?}"
                        )));
                    }
                    chain.push(name.to_string());
                    return self.eval(alias_to, family, chain);
                }
            }
        }
        Ok(None)
    }

    fn record(name: &str, chain: &[String], addresses: AddressList) -> HostRecord {
        HostRecord {
            canonical_name: name.to_string(),
            aliases: chain.to_vec(),
            addresses,
        }
    }

    /// Asks an `api` rule's endpoint about `host`.
    ///
    /// `Ok(None)` means the endpoint declined the name (non-2xx) and
    /// evaluation should fall through to later rules. Timeouts and
    /// connection errors are transient; a 2xx body without a single
    /// address literal is a contract violation.
    fn query_endpoint(
        &self,
        template: &str,
        host: &str,
    ) -> Result<Option<Vec<IpAddr>>, ResolveError> {
        let url = template.replace("{host}", host);

        // One client per lookup: the module shares no connection state
        // across caller threads.
        let client = reqwest::blocking::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .map_err(|err| ResolveError::Failed(format!("http client: {err}")))?;

        let response = match client.get(&url).send() {
            Ok(response) => response,
            Err(err) => {
                let reason = format!("endpoint {url}: {err}");
                return Err(if err.is_timeout() || err.is_connect() {
                    ResolveError::Transient(reason)
                } else {
                    ResolveError::Failed(reason)
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!("endpoint {url} declined with status {status}");
            return Ok(None);
        }

        let body = response
            .text()
            .map_err(|err| ResolveError::Transient(format!("endpoint {url}: {err}")))?;
        let addrs: Vec<IpAddr> = body
            .split_whitespace()
            .filter_map(|token| token.parse().ok())
            .collect();
        if addrs.is_empty() {
            return Err(ResolveError::Failed(format!(
                "endpoint {url} returned no address literal"
            )));
        }
        Ok(Some(addrs))
    }
}

impl HostResolver for RuleResolver {
    fn resolve(
        &self,
        name: &str,
        family: AddressFamily,
    ) -> Result<Option<HostRecord>, ResolveError> {
        let mut chain = Vec::new();
        self.eval(name, family, &mut chain)
    }
}
