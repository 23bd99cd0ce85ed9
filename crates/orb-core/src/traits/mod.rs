//! Core traits for the tunnel coordinator
//!
//! This module defines the abstract interfaces the coordinator drives.
//!
//! - [`RouteStore`]: Load and atomically replace the routing file
//! - [`DnsGateway`]: Publish and withdraw DNS routes to the tunnel
//! - [`AccessPolicy`]: Map access levels onto provider-side rules
//! - [`GroupDirectory`]: Administer provider-side access groups
//! - [`ServiceController`]: Restart, inspect, and tail the tunnel daemon
//! - [`ReachabilityProbe`]: Best-effort public reachability checks

pub mod access_policy;
pub mod dns_gateway;
pub mod probe;
pub mod route_store;
pub mod service_controller;

pub use access_policy::{AccessGroup, AccessPolicy, GroupDirectory};
pub use dns_gateway::{DnsGateway, DnsRoute, RouteChange};
pub use probe::{Reachability, ReachabilityProbe};
pub use route_store::RouteStore;
pub use service_controller::{LogQuery, LogStream, ServiceController, ServiceState};
