//! Mutation coordinator
//!
//! The MutationCoordinator turns "publish subdomain X at port Y" into an
//! all-or-nothing change across systems that offer no transactions.
//!
//! ## Architecture
//!
//! ```text
//!                      ┌──────────────────────┐
//!   ExposeRequest ───▶ │ MutationCoordinator  │ ◀── HostLock (flock)
//!                      └──────────────────────┘
//!                                 │
//!      ┌──────────────┬───────────┼───────────────┬──────────────────┐
//!      ▼              ▼           ▼               ▼                  ▼
//! ┌──────────┐  ┌───────────┐ ┌──────────────┐ ┌───────────────────┐ ┌───────┐
//! │RouteStore│  │DnsGateway │ │ AccessPolicy │ │ ServiceController │ │ Probe │
//! └──────────┘  └───────────┘ └──────────────┘ └───────────────────┘ └───────┘
//!    step 1        step 2         step 3             step 4          (reads)
//! ```
//!
//! ## Saga Flow (expose)
//!
//! 1. Validate input (no lock, no side effects)
//! 2. Acquire the host lock
//! 3. Load the routing file fresh and check the catch-all invariant
//! 4. Identical rule already present: report `AlreadyConfigured` with the
//!    access in effect, write nothing
//! 5. Different rule present: fail with `Conflict`, write nothing
//! 6. Write the routing file (undo: restore prior bytes)
//! 7. Publish DNS (undo: withdraw the record)
//! 8. Apply access, if not public (undo: revoke group rule or remove container)
//! 9. Restart the daemon
//! 10. Commit, release the lock
//!
//! Any failure from step 6 on unwinds the applied steps in reverse order
//! before the lock is released.

mod saga;

pub use saga::{SagaEvent, SagaState, Step};

use chrono::Utc;
use futures::future::join_all;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::access::{AccessGrant, AccessLevel};
use crate::config::TunnelConfig;
use crate::error::{Error, Result};
use crate::lock::HostLock;
use crate::routes::{IngressRule, RouteSet};
use crate::traits::{
    AccessPolicy, DnsGateway, DnsRoute, LogQuery, LogStream, Reachability, ReachabilityProbe,
    RouteChange, RouteStore, ServiceController, ServiceState,
};
use crate::validation::{
    ServiceType, hostname_for, parse_access_level, parse_expiry, service_url, validate_port,
    validate_subdomain,
};
use saga::{Compensation, Systems, TransactionLog};

/// Whether an operation changed anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// External state was modified
    Configured,
    /// The requested state was already in place; nothing was written
    AlreadyConfigured,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Configured => f.write_str("configured"),
            Change::AlreadyConfigured => f.write_str("already configured"),
        }
    }
}

/// Raw expose parameters, validated by the coordinator before locking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposeRequest {
    /// Subdomain label
    pub subdomain: String,
    /// Local port, as typed
    pub port: String,
    /// Service type (`http`, `tcp`, ...)
    pub service_type: String,
    /// `public`, `private`, or a group name
    pub access: String,
    /// Group grant lifetime (`30m`, `24h`, `7d`) or empty
    pub expiry: String,
}

impl ExposeRequest {
    /// Public HTTP exposure of `port` under `subdomain`
    pub fn new(subdomain: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            subdomain: subdomain.into(),
            port: port.into(),
            service_type: ServiceType::default().to_string(),
            access: AccessLevel::Public.to_string(),
            expiry: String::new(),
        }
    }

    /// Set the service type
    pub fn service_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = service_type.into();
        self
    }

    /// Set the access level
    pub fn access(mut self, access: impl Into<String>) -> Self {
        self.access = access.into();
        self
    }

    /// Set the group grant lifetime
    pub fn expires_in(mut self, expiry: impl Into<String>) -> Self {
        self.expiry = expiry.into();
        self
    }
}

struct ValidExpose {
    subdomain: String,
    port: u16,
    service_type: ServiceType,
    level: AccessLevel,
    ttl: Option<chrono::Duration>,
}

/// Result of a saga entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Full hostname
    pub hostname: String,
    /// Ingress target after the call (removed target for `unexpose`)
    pub target: String,
    /// Whether anything changed
    pub change: Change,
    /// Access applied by `expose`, carrying the expiry the caller must schedule.
    /// On `AlreadyConfigured` this is the access already in effect, never with
    /// an expiry.
    pub grant: Option<AccessGrant>,
}

/// One row of `list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// Full hostname
    pub hostname: String,
    /// Ingress target
    pub target: String,
    /// Effective access level (best effort)
    pub access: AccessLevel,
    /// Public reachability (best effort)
    pub reachability: Reachability,
}

/// DNS side of a health report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsStatus {
    /// A record exists
    Published(DnsRoute),
    /// No record exists
    Missing,
    /// The lookup failed
    Unknown(String),
}

/// Single-hostname health report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    /// Full hostname
    pub hostname: String,
    /// Ingress target, if the routing file has a rule for the hostname
    pub target: Option<String>,
    /// DNS record state
    pub dns: DnsStatus,
    /// Effective access level
    pub access: AccessLevel,
    /// Public reachability
    pub reachability: Reachability,
    /// Tunnel daemon state
    pub service: ServiceState,
}

impl HealthReport {
    /// Routed, published, and answering
    pub fn is_healthy(&self) -> bool {
        self.target.is_some()
            && matches!(self.dns, DnsStatus::Published(_))
            && self.service == ServiceState::Running
            && self.reachability.is_healthy()
    }
}

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Base domain
    pub domain: String,
    /// Operator identity for owner rules
    pub owner_email: Option<String>,
    /// Host lock path
    pub lock_path: PathBuf,
    /// Maximum wait for the host lock
    pub lock_timeout: Duration,
}

impl CoordinatorSettings {
    /// Derive settings from a validated configuration
    pub fn from_config(config: &TunnelConfig) -> Self {
        Self {
            domain: config.domain.clone(),
            owner_email: config.owner_email.clone(),
            lock_path: config.lock.path.clone(),
            lock_timeout: config.lock.timeout(),
        }
    }
}

/// Saga coordinator over the injected collaborators
///
/// Holds no state across calls: every operation reloads the routing file
/// after taking the host lock.
pub struct MutationCoordinator {
    settings: CoordinatorSettings,
    lock: HostLock,
    routes: Box<dyn RouteStore>,
    dns: Box<dyn DnsGateway>,
    access: Box<dyn AccessPolicy>,
    service: Box<dyn ServiceController>,
    probe: Box<dyn ReachabilityProbe>,
    events: Option<mpsc::Sender<SagaEvent>>,
}

impl MutationCoordinator {
    /// Create a new coordinator
    ///
    /// # Parameters
    ///
    /// - `settings`: domain, owner identity, and lock settings
    /// - `routes`: routing file store
    /// - `dns`: DNS gateway
    /// - `access`: access policy manager
    /// - `service`: tunnel daemon controller
    /// - `probe`: reachability probe for read-only reports
    pub fn new(
        settings: CoordinatorSettings,
        routes: Box<dyn RouteStore>,
        dns: Box<dyn DnsGateway>,
        access: Box<dyn AccessPolicy>,
        service: Box<dyn ServiceController>,
        probe: Box<dyn ReachabilityProbe>,
    ) -> Self {
        let lock = HostLock::new(&settings.lock_path, settings.lock_timeout);
        Self {
            settings,
            lock,
            routes,
            dns,
            access,
            service,
            probe,
            events: None,
        }
    }

    /// Receive state machine events for every subsequent call
    ///
    /// Events are dropped (and logged) when the channel is full.
    pub fn subscribe(&mut self, capacity: usize) -> mpsc::Receiver<SagaEvent> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.events = Some(tx);
        rx
    }

    /// Full hostname for `subdomain`
    pub fn hostname(&self, subdomain: &str) -> String {
        hostname_for(subdomain, &self.settings.domain)
    }

    /// Publish a local port under a subdomain
    ///
    /// # Returns
    ///
    /// - `Ok(Outcome)` with `Change::AlreadyConfigured` if the identical rule
    ///   already exists (nothing written)
    /// - `Ok(Outcome)` with `Change::Configured` after all four steps applied
    ///
    /// # Errors
    ///
    /// - `Error::Validation`: bad input; lock not taken
    /// - `Error::LockTimeout`: another invocation held the lock too long
    /// - `Error::Precondition`: the routing file violates its invariants
    /// - `Error::Conflict`: the hostname is routed to another target
    /// - `Error::StepFailure`: a step failed and everything was rolled back
    /// - `Error::CompensationFailure`: a step failed and rollback did not complete
    pub async fn expose(&self, request: &ExposeRequest) -> Result<Outcome> {
        let request = self.validate_expose(request)?;
        let hostname = self.hostname(&request.subdomain);
        let target = service_url(request.port, request.service_type);
        let grant = AccessGrant::new(&hostname, request.level.clone())
            .with_expiry(request.ttl.map(|ttl| Utc::now() + ttl));

        let _guard = self.lock.acquire().await?;
        let mut log = TransactionLog::begin("expose", &hostname, self.events.clone());

        let (prior, mut routes) = match self.load_checked().await {
            Ok(loaded) => loaded,
            Err(e) => {
                log.abandon(&e);
                return Err(e);
            }
        };

        if let Some(existing) = routes.rule(&hostname) {
            if existing.target == target {
                info!("{} already routes to {}", hostname, target);
                log.commit();
                // Report the access actually in effect; nothing was granted
                let current = self.access.describe(&hostname).await;
                return Ok(Outcome {
                    grant: Some(AccessGrant::new(&hostname, current)),
                    hostname,
                    target,
                    change: Change::AlreadyConfigured,
                });
            }

            let err = Error::Conflict {
                hostname: hostname.clone(),
                subdomain: request.subdomain.clone(),
                existing: existing.target.clone(),
            };
            log.abandon(&err);
            return Err(err);
        }

        if let Err(e) = routes.insert_before_catch_all(IngressRule::new(&hostname, &target)) {
            log.abandon(&e);
            return Err(e);
        }

        // Step 1: routing file
        info!("Adding ingress rule {} -> {}", hostname, target);
        if let Err(e) = self.routes.save(&routes).await {
            return Err(log.roll_back(&self.systems(), Step::Routes, e).await);
        }
        log.applied(Step::Routes, Some(Compensation::RestoreRoutes { prior }));

        // Step 2: DNS
        info!(
            "Publishing {} via {}",
            hostname,
            self.dns.provider_name()
        );
        let remove_dns = Compensation::RemoveDns {
            tunnel: routes.tunnel.clone(),
            hostname: hostname.clone(),
        };
        match self.dns.create_route(&routes.tunnel, &hostname).await {
            Ok(RouteChange::Unchanged) => {
                debug!("DNS record for {} already points at the tunnel", hostname);
                log.applied(Step::Dns, None);
            }
            Ok(_) => log.applied(Step::Dns, Some(remove_dns)),
            Err(e) => {
                if e.is_indeterminate() {
                    log.push_uncertain(remove_dns);
                }
                return Err(log.roll_back(&self.systems(), Step::Dns, e).await);
            }
        }

        // Step 3: access
        if request.level.requires_policy() {
            let identity = self.settings.owner_email.as_deref().unwrap_or_default();
            info!("Applying {} access to {}", request.level, hostname);
            match self.access.grant(&hostname, &request.level, identity).await {
                Ok(receipt) => {
                    let undo = if receipt.created_container {
                        Some(Compensation::RemovePolicy {
                            hostname: hostname.clone(),
                        })
                    } else if receipt.issued_group_rule {
                        Some(Compensation::RevokeGroup {
                            hostname: hostname.clone(),
                        })
                    } else {
                        None
                    };
                    log.applied(Step::Access, undo);
                }
                Err(e) => {
                    if e.is_indeterminate() {
                        log.push_uncertain(Compensation::RemovePolicy {
                            hostname: hostname.clone(),
                        });
                    }
                    return Err(log.roll_back(&self.systems(), Step::Access, e).await);
                }
            }
        }

        // Step 4: daemon
        if let Err(e) = self.restart_service().await {
            return Err(log.roll_back(&self.systems(), Step::Restart, e).await);
        }
        log.applied(Step::Restart, None);
        log.commit();

        Ok(Outcome {
            hostname,
            target,
            change: Change::Configured,
            grant: Some(grant),
        })
    }

    /// Withdraw a subdomain: rule, DNS record, access container, restart
    ///
    /// # Errors
    ///
    /// - `Error::Precondition`: the subdomain is not exposed, or the routing
    ///   file violates its invariants
    /// - `Error::StepFailure` / `Error::CompensationFailure` as for `expose`
    pub async fn unexpose(&self, subdomain: &str) -> Result<Outcome> {
        validate_subdomain(subdomain)?;
        let hostname = self.hostname(subdomain);

        let _guard = self.lock.acquire().await?;
        let mut log = TransactionLog::begin("unexpose", &hostname, self.events.clone());

        let (prior, mut routes) = match self.load_checked().await {
            Ok(loaded) => loaded,
            Err(e) => {
                log.abandon(&e);
                return Err(e);
            }
        };

        let removed = match routes
            .find_by_hostname(&hostname)
            .ok_or_else(|| Self::not_exposed(&hostname))
            .and_then(|idx| routes.remove_by_index(idx))
        {
            Ok(rule) => rule,
            Err(e) => {
                log.abandon(&e);
                return Err(e);
            }
        };

        // Read before any write so the container can be re-created on rollback
        let prior_level = self.access.describe(&hostname).await;

        // Step 1: routing file
        info!("Removing ingress rule {} -> {}", hostname, removed.target);
        if let Err(e) = self.routes.save(&routes).await {
            return Err(log.roll_back(&self.systems(), Step::Routes, e).await);
        }
        log.applied(Step::Routes, Some(Compensation::RestoreRoutes { prior }));

        // Step 2: DNS
        info!("Withdrawing DNS record for {}", hostname);
        let recreate_dns = Compensation::RecreateDns {
            tunnel: routes.tunnel.clone(),
            hostname: hostname.clone(),
        };
        match self.dns.remove_route(&routes.tunnel, &hostname).await {
            Ok(RouteChange::Unchanged) => {
                debug!("No DNS record for {} to remove", hostname);
                log.applied(Step::Dns, None);
            }
            Ok(_) => log.applied(Step::Dns, Some(recreate_dns)),
            Err(e) => {
                if e.is_indeterminate() {
                    log.push_uncertain(recreate_dns);
                }
                return Err(log.roll_back(&self.systems(), Step::Dns, e).await);
            }
        }

        // Step 3: access
        info!("Removing access policy for {}", hostname);
        match self.access.remove(&hostname).await {
            Ok(true) => {
                let level = if prior_level.requires_policy() {
                    prior_level
                } else {
                    AccessLevel::Private
                };
                log.applied(
                    Step::Access,
                    Some(Compensation::RestorePolicy {
                        hostname: hostname.clone(),
                        level,
                        identity: self.settings.owner_email.clone(),
                    }),
                );
            }
            Ok(false) => log.applied(Step::Access, None),
            Err(e) => {
                if e.is_indeterminate() && prior_level.requires_policy() {
                    log.push_uncertain(Compensation::RestorePolicy {
                        hostname: hostname.clone(),
                        level: prior_level,
                        identity: self.settings.owner_email.clone(),
                    });
                }
                return Err(log.roll_back(&self.systems(), Step::Access, e).await);
            }
        }

        // Step 4: daemon
        if let Err(e) = self.restart_service().await {
            return Err(log.roll_back(&self.systems(), Step::Restart, e).await);
        }
        log.applied(Step::Restart, None);
        log.commit();

        Ok(Outcome {
            hostname,
            target: removed.target,
            change: Change::Configured,
            grant: None,
        })
    }

    /// Point an exposed subdomain at a different local port or service type
    ///
    /// DNS and access are untouched since the hostname does not change.
    ///
    /// # Errors
    ///
    /// - `Error::Validation`, `Error::LockTimeout`
    /// - `Error::Precondition`: the subdomain is not exposed
    /// - `Error::StepFailure` / `Error::CompensationFailure`
    pub async fn update(&self, subdomain: &str, port: &str, service_type: &str) -> Result<Outcome> {
        validate_subdomain(subdomain)?;
        let port = validate_port(port)?;
        let service_type: ServiceType = service_type.parse()?;
        let hostname = self.hostname(subdomain);
        let target = service_url(port, service_type);

        let _guard = self.lock.acquire().await?;
        let mut log = TransactionLog::begin("update", &hostname, self.events.clone());

        let (prior, mut routes) = match self.load_checked().await {
            Ok(loaded) => loaded,
            Err(e) => {
                log.abandon(&e);
                return Err(e);
            }
        };

        let previous = match routes.rule(&hostname) {
            Some(rule) if rule.target == target => {
                info!("{} already routes to {}", hostname, target);
                log.commit();
                return Ok(Outcome {
                    hostname,
                    target,
                    change: Change::AlreadyConfigured,
                    grant: None,
                });
            }
            Some(_) => match routes.replace_by_hostname(&hostname, &target) {
                Ok(previous) => previous,
                Err(e) => {
                    log.abandon(&e);
                    return Err(e);
                }
            },
            None => {
                let err = Self::not_exposed(&hostname);
                log.abandon(&err);
                return Err(err);
            }
        };

        // Step 1: routing file
        info!("Updating ingress rule {}: {} -> {}", hostname, previous, target);
        if let Err(e) = self.routes.save(&routes).await {
            return Err(log.roll_back(&self.systems(), Step::Routes, e).await);
        }
        log.applied(Step::Routes, Some(Compensation::RestoreRoutes { prior }));

        // Step 2: daemon
        if let Err(e) = self.restart_service().await {
            return Err(log.roll_back(&self.systems(), Step::Restart, e).await);
        }
        log.applied(Step::Restart, None);
        log.commit();

        Ok(Outcome {
            hostname,
            target,
            change: Change::Configured,
            grant: None,
        })
    }

    /// Narrow a group-protected subdomain back to owner-only access
    ///
    /// Removes only the group rule; the owner rule stays. This is the
    /// primitive an external scheduler calls when a timed grant expires.
    ///
    /// # Returns
    ///
    /// `Change::AlreadyConfigured` when there was no group rule to remove.
    pub async fn revoke_access(&self, subdomain: &str) -> Result<Outcome> {
        validate_subdomain(subdomain)?;
        let hostname = self.hostname(subdomain);

        let _guard = self.lock.acquire().await?;
        let mut log = TransactionLog::begin("revoke-access", &hostname, self.events.clone());

        let target = match self.routes.load().await.and_then(|routes| {
            routes
                .rule(&hostname)
                .map(|rule| rule.target.clone())
                .ok_or_else(|| Self::not_exposed(&hostname))
        }) {
            Ok(target) => target,
            Err(e) => {
                log.abandon(&e);
                return Err(e);
            }
        };

        info!("Revoking group access to {}", hostname);
        let change = match self.access.revoke_group(&hostname).await {
            Ok(true) => Change::Configured,
            Ok(false) => {
                info!("{} has no group rule to revoke", hostname);
                Change::AlreadyConfigured
            }
            Err(e) => return Err(log.roll_back(&self.systems(), Step::Access, e).await),
        };

        log.applied(Step::Access, None);
        log.commit();

        Ok(Outcome {
            hostname: hostname.clone(),
            target,
            change,
            grant: Some(AccessGrant::new(hostname, AccessLevel::Private)),
        })
    }

    /// Restart the tunnel daemon under the host lock
    pub async fn restart(&self) -> Result<()> {
        let _guard = self.lock.acquire().await?;
        let mut log = TransactionLog::begin("restart", "tunnel daemon", self.events.clone());

        if let Err(e) = self.restart_service().await {
            return Err(log.roll_back(&self.systems(), Step::Restart, e).await);
        }
        log.applied(Step::Restart, None);
        log.commit();
        Ok(())
    }

    /// Enumerate exposed hostnames with access level and reachability
    ///
    /// Lock-free. A failed probe or policy lookup only affects its own row.
    /// Rows are looked up concurrently, so one slow hostname costs at most a
    /// single probe timeout; entries keep routing-file order.
    pub async fn list(&self) -> Result<Vec<RouteEntry>> {
        let routes = self.routes.load().await?;

        let rows = routes.exposed().filter_map(|rule| {
            let hostname = rule.hostname.clone()?;
            Some(async move {
                let (access, reachability) = tokio::join!(
                    self.access.describe(&hostname),
                    self.probe_target(&hostname, &rule.target)
                );
                RouteEntry {
                    hostname,
                    target: rule.target.clone(),
                    access,
                    reachability,
                }
            })
        });

        Ok(join_all(rows).await)
    }

    /// Report routing, DNS, access, and reachability for one subdomain
    ///
    /// Lock-free and read-only.
    pub async fn health(&self, subdomain: &str) -> Result<HealthReport> {
        validate_subdomain(subdomain)?;
        let hostname = self.hostname(subdomain);

        let target = self
            .routes
            .load()
            .await?
            .rule(&hostname)
            .map(|rule| rule.target.clone());

        let dns = match self.dns.lookup_route(&hostname).await {
            Ok(Some(route)) => DnsStatus::Published(route),
            Ok(None) => DnsStatus::Missing,
            Err(e) => {
                warn!("DNS lookup for {} failed: {}", hostname, e);
                DnsStatus::Unknown(e.to_string())
            }
        };

        let access = self.access.describe(&hostname).await;
        let reachability = match &target {
            Some(target) => self.probe_target(&hostname, target).await,
            None => self.probe.probe(&hostname).await,
        };
        let service = self.service.status().await;

        Ok(HealthReport {
            hostname,
            target,
            dns,
            access,
            reachability,
            service,
        })
    }

    /// Tunnel daemon state
    pub async fn status(&self) -> ServiceState {
        self.service.status().await
    }

    /// Stream daemon logs, optionally restricted to one subdomain
    ///
    /// Lock-free; in follow mode the stream runs until dropped.
    pub fn logs(&self, subdomain: Option<&str>, lines: usize, follow: bool) -> Result<LogStream> {
        let filter = match subdomain {
            Some(subdomain) => {
                validate_subdomain(subdomain)?;
                Some(self.hostname(subdomain))
            }
            None => None,
        };

        self.service.logs(&LogQuery {
            lines,
            follow,
            filter,
        })
    }

    fn validate_expose(&self, request: &ExposeRequest) -> Result<ValidExpose> {
        validate_subdomain(&request.subdomain)?;
        let port = validate_port(&request.port)?;
        let service_type: ServiceType = request.service_type.parse()?;
        let level = parse_access_level(&request.access)?;
        let ttl = parse_expiry(&request.expiry)?;

        if ttl.is_some() && level.group().is_none() {
            return Err(Error::validation(
                "--expires only applies to group access (e.g. --access friends --expires 24h)",
            ));
        }
        if level.requires_policy() && self.settings.owner_email.is_none() {
            return Err(Error::validation(format!(
                "{} access requires USER_EMAIL to be set (the owner rule needs an identity)",
                level
            )));
        }

        Ok(ValidExpose {
            subdomain: request.subdomain.clone(),
            port,
            service_type,
            level,
            ttl,
        })
    }

    /// Load the routing file and verify its invariants
    ///
    /// Returns the exact bytes read alongside the parsed set so rollback can
    /// restore them verbatim.
    async fn load_checked(&self) -> Result<(Vec<u8>, RouteSet)> {
        let raw = self.routes.load_raw().await?;
        let routes = RouteSet::from_yaml(&raw)?;
        routes.ensure_catch_all_invariant().map_err(|e| {
            Error::precondition(format!(
                "routing file {} is not safe to modify: {}",
                self.routes.location(),
                e
            ))
        })?;
        Ok((raw, routes))
    }

    async fn restart_service(&self) -> Result<()> {
        info!("Restarting tunnel daemon");
        self.service.restart().await
    }

    async fn probe_target(&self, hostname: &str, target: &str) -> Reachability {
        if target.starts_with("http://") || target.starts_with("https://") {
            self.probe.probe(hostname).await
        } else {
            Reachability::Skipped
        }
    }

    fn systems(&self) -> Systems<'_> {
        Systems {
            routes: self.routes.as_ref(),
            dns: self.dns.as_ref(),
            access: self.access.as_ref(),
        }
    }

    fn not_exposed(hostname: &str) -> Error {
        Error::precondition(format!(
            "{} is not exposed; run `orb tunnel list` to see exposed subdomains",
            hostname
        ))
    }
}
