// # Route Store
//
// The tunnel daemon's routing file: an ordered list of ingress rules plus the
// provider-assigned tunnel identifier.
//
// ## Invariants
//
// - The rule list is non-empty and its last element is the catch-all (no hostname)
// - No other rule is a catch-all
// - Non-empty hostnames are unique
//
// ## Ownership
//
// The mutating helpers on `RouteSet` only touch the in-memory copy. Nothing in
// this module decides when to persist; the coordinator calls
// `RouteStore::save` once the whole change is ready.
//
// ## File Format
//
// ```yaml
// tunnel: 6ff42ae2-765d-4adf-8112-31c55c1551ef
// ingress:
//   - hostname: api.example.com
//     service: http://localhost:8080
//   - service: http_status:404
// credentials-file: /etc/cloudflared/6ff42ae2.json
// ```
//
// Keys the store does not interpret (`credentials-file`, `originRequest`, ...)
// are carried through load/save unchanged.

pub mod file;
pub mod memory;

pub use file::FileRouteStore;
pub use memory::MemoryRouteStore;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A single hostname → local target mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngressRule {
    /// Hostname to match; absent (or empty) for the catch-all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Target URI, e.g. `http://localhost:8080` or `http_status:404`
    #[serde(rename = "service")]
    pub target: String,

    /// Per-rule settings this crate does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl IngressRule {
    /// Create a hostname rule
    pub fn new(hostname: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            hostname: Some(hostname.into()),
            target: target.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Create a catch-all rule
    pub fn catch_all(target: impl Into<String>) -> Self {
        Self {
            hostname: None,
            target: target.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Whether this rule matches every request
    pub fn is_catch_all(&self) -> bool {
        self.hostname.as_deref().is_none_or(str::is_empty)
    }
}

/// The full routing file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSet {
    /// Provider-assigned tunnel identifier
    pub tunnel: String,

    /// Ordered ingress rules; first match wins
    #[serde(default)]
    pub ingress: Vec<IngressRule>,

    /// Top-level settings this crate does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl RouteSet {
    /// Create a route set holding only a catch-all rule
    pub fn new(tunnel: impl Into<String>, catch_all_target: impl Into<String>) -> Self {
        Self {
            tunnel: tunnel.into(),
            ingress: vec![IngressRule::catch_all(catch_all_target)],
            extra: BTreeMap::new(),
        }
    }

    /// Parse a routing file
    pub fn from_yaml(bytes: &[u8]) -> Result<Self> {
        serde_yaml::from_slice(bytes)
            .map_err(|e| Error::corrupt(format!("invalid YAML in routing file: {}", e)))
    }

    /// Serialize to the on-disk representation
    pub fn to_yaml(&self) -> Result<Vec<u8>> {
        Ok(serde_yaml::to_string(self)?.into_bytes())
    }

    /// Verify the catch-all and uniqueness invariants.
    ///
    /// Never repairs anything: a route set that fails here is reported, not fixed.
    pub fn ensure_catch_all_invariant(&self) -> Result<()> {
        let Some(last) = self.ingress.last() else {
            return Err(Error::invariant(
                "routing file has no ingress rules; add a catch-all rule (e.g. `- service: http_status:404`) first",
            ));
        };

        if !last.is_catch_all() {
            return Err(Error::invariant(format!(
                "last ingress rule must be a catch-all (no hostname), got hostname={:?}",
                last.hostname.as_deref().unwrap_or_default()
            )));
        }

        let mut seen = HashSet::new();
        for (idx, rule) in self.ingress[..self.ingress.len() - 1].iter().enumerate() {
            let Some(hostname) = rule.hostname.as_deref().filter(|h| !h.is_empty()) else {
                return Err(Error::invariant(format!(
                    "ingress rule #{} is a catch-all but is not last",
                    idx + 1
                )));
            };
            if !seen.insert(hostname) {
                return Err(Error::invariant(format!(
                    "hostname {} appears in more than one ingress rule",
                    hostname
                )));
            }
        }

        Ok(())
    }

    /// Index of the rule for `hostname`, if present
    pub fn find_by_hostname(&self, hostname: &str) -> Option<usize> {
        self.ingress
            .iter()
            .position(|rule| rule.hostname.as_deref() == Some(hostname))
    }

    /// Rule for `hostname`, if present
    pub fn rule(&self, hostname: &str) -> Option<&IngressRule> {
        self.find_by_hostname(hostname).map(|idx| &self.ingress[idx])
    }

    /// Insert `rule` immediately before the catch-all and return its index
    pub fn insert_before_catch_all(&mut self, rule: IngressRule) -> Result<usize> {
        self.ensure_catch_all_invariant()?;
        if let Some(hostname) = rule.hostname.as_deref()
            && self.find_by_hostname(hostname).is_some()
        {
            return Err(Error::invariant(format!(
                "hostname {} already has an ingress rule",
                hostname
            )));
        }

        let idx = self.ingress.len() - 1;
        self.ingress.insert(idx, rule);
        Ok(idx)
    }

    /// Point an existing hostname at a new target, returning the old target
    pub fn replace_by_hostname(&mut self, hostname: &str, target: impl Into<String>) -> Result<String> {
        let idx = self
            .find_by_hostname(hostname)
            .ok_or_else(|| Error::not_found(format!("no ingress rule for {}", hostname)))?;
        Ok(std::mem::replace(&mut self.ingress[idx].target, target.into()))
    }

    /// Remove the rule at `index`; the catch-all can never be removed
    pub fn remove_by_index(&mut self, index: usize) -> Result<IngressRule> {
        match self.ingress.get(index) {
            Some(rule) if rule.is_catch_all() => Err(Error::invariant("refusing to remove the catch-all rule")),
            Some(_) => Ok(self.ingress.remove(index)),
            None => Err(Error::not_found(format!("no ingress rule at index {}", index))),
        }
    }

    /// Rules other than the catch-all, in routing order
    pub fn exposed(&self) -> impl Iterator<Item = &IngressRule> {
        self.ingress.iter().filter(|rule| !rule.is_catch_all())
    }
}
