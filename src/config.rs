//! Configuration for nss-dnd
//!
//! Two layers: process-level [`Settings`] read from `NSS_DND_*`
//! environment variables over serialized defaults, and the [`RuleStore`]
//! that keeps the current rule-set snapshot and hot-reloads it when the
//! rules file's mtime advances.

use crate::rules::RuleSet;
use arc_swap::ArcSwap;
use figment::{
    providers::{Env, Serialized},
    Figment,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Prefix of every environment variable this module reads.
pub const ENV_PREFIX: &str = "NSS_DND_";

/// Rules file consulted when `NSS_DND_CONFIG_FILE_PATH` is not set.
pub const DEFAULT_RULES_PATH: &str = "/etc/nss_dnd_rules.yaml";

/// Process-level settings for the module.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Path of the YAML rules file.
    pub config_file_path: PathBuf,
    /// Timeout for `api` rule requests, in milliseconds.
    pub http_timeout_ms: u64,
    /// Log filter for the diagnostic sink.
    pub log: String,
}

impl Settings {
    /// Loads settings by layering `NSS_DND_*` environment variables over
    /// the defaults, e.g. `NSS_DND_CONFIG_FILE_PATH=/tmp/rules.yaml`.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_file_path: PathBuf::from(DEFAULT_RULES_PATH),
            http_timeout_ms: 3000,
            log: "warn".to_string(),
        }
    }
}

/// One loaded state of the rules file.
#[derive(Debug)]
struct Snapshot {
    rules: Arc<RuleSet>,
    /// Mtime of the file the snapshot was loaded from; `None` until the
    /// file has been seen at least once.
    modified: Option<SystemTime>,
}

/// Holds the current rule set and reloads it when the file changes.
///
/// Reads are lock-free snapshot loads; a reload atomically swaps the
/// snapshot. Concurrent reloads may both parse the file; the last store
/// wins and either result is a valid snapshot.
#[derive(Debug)]
pub struct RuleStore {
    path: PathBuf,
    snapshot: ArcSwap<Snapshot>,
}

impl RuleStore {
    /// A store over `path`. Nothing is read until [`Self::current`] is
    /// first called; until the file is readable, lookups see an empty
    /// rule set.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            snapshot: ArcSwap::from_pointee(Snapshot {
                rules: Arc::new(RuleSet::empty()),
                modified: None,
            }),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// The rule set to use for one lookup, reloading the file first if
    /// its mtime advanced past the loaded snapshot's.
    pub fn current(&self) -> Arc<RuleSet> {
        let snapshot = self.snapshot.load();

        let modified = match std::fs::metadata(&self.path).and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(err) => {
                // Unreadable file: keep whatever was loaded before.
                debug!("rules file {}: {err}", self.path.display());
                return snapshot.rules.clone();
            }
        };

        let stale = match snapshot.modified {
            None => true,
            Some(loaded) => modified > loaded,
        };
        if !stale {
            return snapshot.rules.clone();
        }

        match RuleSet::load(&self.path) {
            Ok(rules) => {
                let rules = Arc::new(rules);
                self.snapshot.store(Arc::new(Snapshot {
                    rules: rules.clone(),
                    modified: Some(modified),
                }));
                info!(
                    "loaded {} rules from {}",
                    rules.len(),
                    self.path.display()
                );
                rules
            }
            Err(err) => {
                warn!(
                    "keeping previous rules, reload of {} failed: {err}",
                    self.path.display()
                );
                // Record the broken file's mtime so the warning fires
                // once per change, not once per lookup.
                let rules = snapshot.rules.clone();
                self.snapshot.store(Arc::new(Snapshot {
                    rules: rules.clone(),
                    modified: Some(modified),
                }));
                rules
            }
        }
    }
}
