//! Test doubles and common utilities for coordinator contract tests
//!
//! Every fake is `Clone` and shares its state through `Arc`s, so a test keeps
//! one handle for assertions and gives another to the coordinator.

#![allow(dead_code)]

use async_trait::async_trait;
use orb_core::access::{GROUP_PRECEDENCE, OWNER_PRECEDENCE};
use orb_core::coordinator::CoordinatorSettings;
use orb_core::error::{Error, Result};
use orb_core::traits::{
    AccessPolicy, DnsGateway, DnsRoute, LogQuery, LogStream, Reachability, ReachabilityProbe,
    RouteChange, RouteStore, ServiceController, ServiceState,
};
use orb_core::{AccessLevel, GrantReceipt, IncludeRule, MemoryRouteStore, MutationCoordinator, RouteSet};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DOMAIN: &str = "example.com";
pub const TUNNEL: &str = "6ff42ae2-765d-4adf-8112-31c55c1551ef";
pub const OWNER: &str = "owner@example.com";
pub const CATCH_ALL: &str = "http_status:404";

/// How an injected failure behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Rejected before anything was applied
    Definite,
    /// Applied remotely, but the caller sees a transport error
    AppliedThenLost,
    /// Not applied, and the caller sees a transport error
    Lost,
}

impl Failure {
    fn error(self, what: &str) -> Error {
        match self {
            Failure::Definite => Error::provider("fake", format!("{} rejected", what)),
            Failure::AppliedThenLost | Failure::Lost => Error::http(format!("{}: connection reset", what)),
        }
    }
}

/// Routing file in memory with a write counter and failure switch
#[derive(Clone, Default)]
pub struct CountingRouteStore {
    inner: MemoryRouteStore,
    saves: Arc<AtomicUsize>,
    fail_saves: Arc<Mutex<bool>>,
}

impl CountingRouteStore {
    /// Store holding `[catch-all]`
    pub fn catch_all_only() -> Self {
        Self::with_routes(&RouteSet::new(TUNNEL, CATCH_ALL))
    }

    pub fn with_routes(routes: &RouteSet) -> Self {
        Self {
            inner: MemoryRouteStore::with_routes(routes).unwrap(),
            ..Default::default()
        }
    }

    pub fn with_bytes(bytes: &[u8]) -> Self {
        Self {
            inner: MemoryRouteStore::with_bytes(bytes.to_vec()),
            ..Default::default()
        }
    }

    pub async fn bytes(&self) -> Vec<u8> {
        self.inner.contents().await.unwrap_or_default()
    }

    pub async fn routes(&self) -> RouteSet {
        RouteSet::from_yaml(&self.bytes().await).unwrap()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap() = fail;
    }
}

#[async_trait]
impl RouteStore for CountingRouteStore {
    async fn load_raw(&self) -> Result<Vec<u8>> {
        self.inner.load_raw().await
    }

    async fn save_raw(&self, contents: &[u8]) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if *self.fail_saves.lock().unwrap() {
            return Err(Error::permission_denied("fake routing file is read-only"));
        }
        self.inner.save_raw(contents).await
    }

    fn location(&self) -> String {
        "<counting>".to_string()
    }
}

/// DNS zone in memory: hostname → tunnel
#[derive(Clone, Default)]
pub struct FakeDns {
    records: Arc<Mutex<BTreeMap<String, String>>>,
    create_calls: Arc<AtomicUsize>,
    remove_calls: Arc<AtomicUsize>,
    fail_create: Arc<Mutex<Option<Failure>>>,
    fail_remove: Arc<Mutex<Option<Failure>>>,
    fail_lookup: Arc<Mutex<bool>>,
}

impl FakeDns {
    pub fn records(&self) -> BTreeMap<String, String> {
        self.records.lock().unwrap().clone()
    }

    pub fn has_record(&self, hostname: &str) -> bool {
        self.records.lock().unwrap().contains_key(hostname)
    }

    pub fn insert_record(&self, hostname: &str, tunnel: &str) {
        self.records
            .lock()
            .unwrap()
            .insert(hostname.to_string(), tunnel.to_string());
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    pub fn fail_create(&self, failure: Option<Failure>) {
        *self.fail_create.lock().unwrap() = failure;
    }

    pub fn fail_remove(&self, failure: Option<Failure>) {
        *self.fail_remove.lock().unwrap() = failure;
    }

    pub fn fail_lookup(&self, fail: bool) {
        *self.fail_lookup.lock().unwrap() = fail;
    }
}

#[async_trait]
impl DnsGateway for FakeDns {
    async fn create_route(&self, tunnel_id: &str, hostname: &str) -> Result<RouteChange> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let failure = *self.fail_create.lock().unwrap();

        if failure == Some(Failure::Definite) || failure == Some(Failure::Lost) {
            return Err(failure.unwrap().error("create"));
        }

        let change = {
            let mut records = self.records.lock().unwrap();
            match records.get(hostname) {
                Some(existing) if existing == tunnel_id => RouteChange::Unchanged,
                Some(existing) => {
                    return Err(Error::already_exists(format!(
                        "{} points at {}",
                        hostname, existing
                    )));
                }
                None => {
                    records.insert(hostname.to_string(), tunnel_id.to_string());
                    RouteChange::Created
                }
            }
        };

        match failure {
            Some(f) => Err(f.error("create")),
            None => Ok(change),
        }
    }

    async fn remove_route(&self, _tunnel_id: &str, hostname: &str) -> Result<RouteChange> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        let injected = *self.fail_remove.lock().unwrap();
        if let Some(failure) = injected {
            if failure == Failure::AppliedThenLost {
                self.records.lock().unwrap().remove(hostname);
            }
            return Err(failure.error("remove"));
        }

        match self.records.lock().unwrap().remove(hostname) {
            Some(_) => Ok(RouteChange::Removed),
            None => Ok(RouteChange::Unchanged),
        }
    }

    async fn lookup_route(&self, hostname: &str) -> Result<Option<DnsRoute>> {
        if *self.fail_lookup.lock().unwrap() {
            return Err(Error::http("lookup: connection reset"));
        }
        Ok(self.records.lock().unwrap().get(hostname).map(|tunnel| DnsRoute {
            id: format!("rec-{}", hostname),
            hostname: hostname.to_string(),
            target: format!("{}.cfargotunnel.com", tunnel),
        }))
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Authorization containers in memory: hostname → rules ordered by precedence
#[derive(Clone, Default)]
pub struct FakeAccess {
    containers: Arc<Mutex<BTreeMap<String, Vec<(u32, IncludeRule)>>>>,
    groups: Arc<Mutex<BTreeMap<String, String>>>,
    grant_calls: Arc<AtomicUsize>,
    remove_calls: Arc<AtomicUsize>,
    fail_grant: Arc<Mutex<Option<Failure>>>,
    fail_remove: Arc<Mutex<Option<Failure>>>,
    fail_describe: Arc<Mutex<bool>>,
}

impl FakeAccess {
    /// Register a provider-side group
    pub fn with_group(self, name: &str) -> Self {
        self.groups
            .lock()
            .unwrap()
            .insert(name.to_string(), format!("grp-{}", name));
        self
    }

    pub fn rules(&self, hostname: &str) -> Option<Vec<(u32, IncludeRule)>> {
        self.containers.lock().unwrap().get(hostname).cloned()
    }

    pub fn container_count(&self) -> usize {
        self.containers.lock().unwrap().len()
    }

    pub fn grant_calls(&self) -> usize {
        self.grant_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    pub fn fail_grant(&self, failure: Option<Failure>) {
        *self.fail_grant.lock().unwrap() = failure;
    }

    pub fn fail_remove(&self, failure: Option<Failure>) {
        *self.fail_remove.lock().unwrap() = failure;
    }

    pub fn fail_describe(&self, fail: bool) {
        *self.fail_describe.lock().unwrap() = fail;
    }
}

#[async_trait]
impl AccessPolicy for FakeAccess {
    async fn grant(&self, hostname: &str, level: &AccessLevel, identity: &str) -> Result<GrantReceipt> {
        self.grant_calls.fetch_add(1, Ordering::SeqCst);
        if !level.requires_policy() {
            return Ok(GrantReceipt::default());
        }

        let group_id = match level.group() {
            Some(name) => Some(
                self.groups
                    .lock()
                    .unwrap()
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::GroupNotFound(name.to_string()))?,
            ),
            None => None,
        };

        let failure = *self.fail_grant.lock().unwrap();
        if let Some(f @ (Failure::Definite | Failure::Lost)) = failure {
            return Err(f.error("grant"));
        }

        let mut containers = self.containers.lock().unwrap();
        let created_container = !containers.contains_key(hostname);
        let rules = containers.entry(hostname.to_string()).or_default();

        rules.retain(|(precedence, _)| *precedence != OWNER_PRECEDENCE);
        rules.push((
            OWNER_PRECEDENCE,
            IncludeRule::Email {
                email: identity.to_string(),
            },
        ));

        let had_group_rule = rules.iter().any(|(p, _)| *p == GROUP_PRECEDENCE);
        rules.retain(|(precedence, _)| *precedence != GROUP_PRECEDENCE);
        if let Some(id) = &group_id {
            rules.push((GROUP_PRECEDENCE, IncludeRule::Group { id: id.clone() }));
        }
        rules.sort_by_key(|(precedence, _)| *precedence);
        drop(containers);

        if failure == Some(Failure::AppliedThenLost) {
            return Err(Failure::AppliedThenLost.error("grant"));
        }

        Ok(GrantReceipt {
            created_container,
            issued_group_rule: group_id.is_some() && !had_group_rule,
        })
    }

    async fn revoke_group(&self, hostname: &str) -> Result<bool> {
        let mut containers = self.containers.lock().unwrap();
        let Some(rules) = containers.get_mut(hostname) else {
            return Ok(false);
        };
        let before = rules.len();
        rules.retain(|(precedence, _)| *precedence != GROUP_PRECEDENCE);
        Ok(rules.len() != before)
    }

    async fn remove(&self, hostname: &str) -> Result<bool> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        let injected = *self.fail_remove.lock().unwrap();
        if let Some(failure) = injected {
            if failure == Failure::AppliedThenLost {
                self.containers.lock().unwrap().remove(hostname);
            }
            return Err(failure.error("remove"));
        }
        Ok(self.containers.lock().unwrap().remove(hostname).is_some())
    }

    async fn describe(&self, hostname: &str) -> AccessLevel {
        if *self.fail_describe.lock().unwrap() {
            return AccessLevel::Public;
        }

        let containers = self.containers.lock().unwrap();
        let Some(rules) = containers.get(hostname) else {
            return AccessLevel::Public;
        };

        let groups = self.groups.lock().unwrap();
        for (_, rule) in rules {
            if let IncludeRule::Group { id } = rule
                && let Some((name, _)) = groups.iter().find(|(_, gid)| *gid == id)
            {
                return AccessLevel::Group(name.clone());
            }
        }
        AccessLevel::Private
    }
}

/// Tunnel daemon stand-in
#[derive(Clone)]
pub struct FakeService {
    restarts: Arc<AtomicUsize>,
    fail_restart: Arc<Mutex<bool>>,
    lines: Arc<Vec<String>>,
}

impl Default for FakeService {
    fn default() -> Self {
        Self {
            restarts: Arc::new(AtomicUsize::new(0)),
            fail_restart: Arc::new(Mutex::new(false)),
            lines: Arc::new(vec![
                "INF Starting tunnel".to_string(),
                "INF request host=api.example.com status=200".to_string(),
                "INF request host=web.example.com status=502".to_string(),
                "INF request host=api.example.com status=404".to_string(),
            ]),
        }
    }
}

impl FakeService {
    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }

    pub fn fail_restart(&self, fail: bool) {
        *self.fail_restart.lock().unwrap() = fail;
    }
}

#[async_trait]
impl ServiceController for FakeService {
    async fn restart(&self) -> Result<()> {
        if *self.fail_restart.lock().unwrap() {
            return Err(Error::ProcessNotFound("cloudflared.service".to_string()));
        }
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn status(&self) -> ServiceState {
        ServiceState::Running
    }

    fn logs(&self, query: &LogQuery) -> Result<LogStream> {
        let filter = query.filter.clone();
        let matching: Vec<&String> = self
            .lines
            .iter()
            .filter(|line| filter.as_deref().is_none_or(|f| line.contains(f)))
            .collect();
        let skip = matching.len().saturating_sub(query.lines);
        let lines: Vec<Result<String>> = matching
            .into_iter()
            .skip(skip)
            .cloned()
            .map(Ok)
            .collect();
        Ok(Box::pin(tokio_stream::iter(lines)))
    }
}

/// Probe answering 200 for every hostname except the ones marked down
#[derive(Clone, Default)]
pub struct FakeProbe {
    down: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl FakeProbe {
    /// Make every probe take `delay` before answering
    pub fn slow(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn mark_down(&self, hostname: &str) {
        self.down.lock().unwrap().push(hostname.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for FakeProbe {
    async fn probe(&self, hostname: &str) -> Reachability {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.down.lock().unwrap().iter().any(|h| h == hostname) {
            Reachability::Unreachable {
                reason: "timed out".to_string(),
            }
        } else {
            Reachability::Reachable {
                status: 200,
                latency_ms: 12,
            }
        }
    }
}

/// All fakes for one coordinator
#[derive(Clone, Default)]
pub struct Fakes {
    pub dns: FakeDns,
    pub access: FakeAccess,
    pub service: FakeService,
    pub probe: FakeProbe,
}

/// Settings with an owner identity and a short lock timeout
pub fn settings(lock_dir: &Path) -> CoordinatorSettings {
    CoordinatorSettings {
        domain: DOMAIN.to_string(),
        owner_email: Some(OWNER.to_string()),
        lock_path: lock_dir.join("orb-tunnel.lock"),
        lock_timeout: Duration::from_secs(5),
    }
}

/// Build a coordinator over `store` and clones of `fakes`
pub fn coordinator<S>(store: S, fakes: &Fakes, settings: CoordinatorSettings) -> MutationCoordinator
where
    S: RouteStore + 'static,
{
    MutationCoordinator::new(
        settings,
        Box::new(store),
        Box::new(fakes.dns.clone()),
        Box::new(fakes.access.clone()),
        Box::new(fakes.service.clone()),
        Box::new(fakes.probe.clone()),
    )
}
