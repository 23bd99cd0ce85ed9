// # orb-core
//
// Core library for publishing local services through a tunnel provider.
//
// ## Architecture Overview
//
// Publishing a subdomain touches three systems that know nothing of each other
// and offer no transactions:
// - **RouteStore**: the tunnel daemon's ordered ingress file (local, synchronous)
// - **DnsGateway**: the remote DNS control plane (eventually consistent)
// - **AccessPolicy**: the remote authorization control plane
// - **ServiceController**: the long-running tunnel daemon (restart has downtime)
//
// The **MutationCoordinator** drives them as a saga: each applied step pushes
// its compensation onto a per-call log, and any failure unwinds that log in
// LIFO order before the host lock is released.
//
// ## Design Principles
//
// 1. **Fresh state per call**: the routing file is reloaded on every operation
// 2. **Injected collaborators**: every side effect sits behind a trait object
// 3. **Host-local serialization**: one advisory file lock guards all writers
// 4. **Idempotent intent**: repeated identical calls are reported, not reapplied
// 5. **Honest failure**: a rollback that itself fails is surfaced as dirty

pub mod access;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod lock;
pub mod routes;
pub mod traits;
pub mod validation;

// Re-export core types for convenience
pub use access::{AccessGrant, AccessLevel, GrantReceipt, IncludeRule, PublicOnlyPolicy};
pub use config::{LockConfig, ProviderConfig, ServiceConfig, TunnelConfig};
pub use coordinator::{
    Change, CoordinatorSettings, DnsStatus, ExposeRequest, HealthReport, MutationCoordinator,
    Outcome, RouteEntry, SagaEvent, SagaState, Step,
};
pub use error::{Error, Result};
pub use lock::{HostLock, HostLockGuard};
pub use routes::{FileRouteStore, IngressRule, MemoryRouteStore, RouteSet};
pub use traits::{
    AccessGroup, AccessPolicy, DnsGateway, DnsRoute, GroupDirectory, LogQuery, LogStream,
    Reachability, ReachabilityProbe, RouteChange, RouteStore, ServiceController, ServiceState,
};
pub use validation::ServiceType;
