//! The rule set that drives resolution.
//!
//! This module contains the data structures and logic for parsing,
//! validating, and matching the ordered resolution rules loaded from the
//! YAML rules file. Evaluation of matched rules lives in
//! [`crate::resolver`].

use regex::Regex;
use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating a rules file.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("failed to read rules file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse rules YAML: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("invalid address {value:?} in static rule {pattern:?}")]
    Address { pattern: String, value: String },

    #[error("static rule {pattern:?} has no target address")]
    MissingTarget { pattern: String },
}

/// An ordered set of resolution rules. Evaluation is first-match-wins in
/// file order.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// An empty set; every lookup against it is a miss.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads and compiles a rules file.
    pub fn load(path: &Path) -> Result<Self, RuleError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses and compiles rules from YAML text.
    pub fn parse(content: &str) -> Result<Self, RuleError> {
        let file: RulesFile = serde_yml::from_str(content)?;
        let rules = file
            .rules
            .into_iter()
            .map(Rule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The rules whose pattern matches `name`, in file order.
    pub fn matching<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Rule> {
        self.rules.iter().filter(move |rule| rule.matches(name))
    }
}

/// A single compiled resolution rule.
#[derive(Debug)]
pub struct Rule {
    /// The compiled host-name pattern, anchored to the full name.
    pattern: Regex,
    /// What to do when the pattern matches.
    pub action: RuleAction,
}

/// The action of a matched rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleAction {
    /// Answer with fixed addresses.
    Static { targets: Vec<IpAddr> },
    /// Ask an HTTP endpoint; `{host}` in the template is replaced with
    /// the queried name.
    Api { endpoint: String },
    /// Restart evaluation at another name, recording this one as an
    /// alias.
    Cname { alias_to: String },
}

impl Rule {
    /// Whether this rule applies to `name`. Patterns match the whole
    /// name: a rule for `db.internal` must not catch `db.internal.evil`.
    pub fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }

    fn compile(raw: FileRule) -> Result<Self, RuleError> {
        let (pattern, action) = match raw {
            FileRule::Static { pattern, options } => {
                let raw_targets = options.target_values();
                if raw_targets.is_empty() {
                    return Err(RuleError::MissingTarget { pattern });
                }
                let mut targets = Vec::with_capacity(raw_targets.len());
                for value in raw_targets {
                    let addr: IpAddr = value.parse().map_err(|_| RuleError::Address {
                        pattern: pattern.clone(),
                        value: value.clone(),
                    })?;
                    targets.push(addr);
                }
                (pattern, RuleAction::Static { targets })
            }
            FileRule::Api { pattern, options } => (
                pattern,
                RuleAction::Api {
                    endpoint: options.endpoint,
                },
            ),
            FileRule::Cname { pattern, options } => (
                pattern,
                RuleAction::Cname {
                    alias_to: options.alias_to,
                },
            ),
        };

        let anchored = format!("^(?:{})$", pattern);
        let regex = Regex::new(&anchored).map_err(|source| RuleError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
        Ok(Self {
            pattern: regex,
            action,
        })
    }
}

// --- Deserialization-only structs ---

/// The top-level YAML structure with a list of rules.
#[derive(Debug, Deserialize)]
struct RulesFile {
    #[serde(default)]
    rules: Vec<FileRule>,
}

/// A rule as written in the YAML file, before compilation.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum FileRule {
    Static {
        pattern: String,
        options: StaticOptions,
    },
    Api {
        pattern: String,
        options: ApiOptions,
    },
    Cname {
        pattern: String,
        options: CnameOptions,
    },
}

#[derive(Debug, Deserialize)]
struct StaticOptions {
    /// Single target address.
    #[serde(default)]
    target: Option<String>,
    /// Several target addresses. May be combined with `target`.
    #[serde(default)]
    targets: Vec<String>,
}

impl StaticOptions {
    fn target_values(&self) -> Vec<String> {
        let mut values = Vec::new();
        if let Some(target) = &self.target {
            values.push(target.clone());
        }
        values.extend(self.targets.iter().cloned());
        values
    }
}

#[derive(Debug, Deserialize)]
struct ApiOptions {
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct CnameOptions {
    alias_to: String,
}
