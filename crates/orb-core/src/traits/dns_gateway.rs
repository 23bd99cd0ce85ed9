// # DNS Gateway Trait
//
// Defines the interface for publishing a hostname on the public DNS, pointed
// at the tunnel.
//
// ## Implementations
//
// - Cloudflare: `orb-provider-cloudflare` crate (proxied CNAME to
//   `<tunnel-id>.cfargotunnel.com`)
//
// ## Usage
//
// ```rust,ignore
// use orb_core::DnsGateway;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let gateway = /* DnsGateway implementation */;
//
//     gateway.create_route("6ff42ae2-...", "api.example.com").await?;
//     gateway.remove_route("6ff42ae2-...", "api.example.com").await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Outcome of an idempotent DNS mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteChange {
    /// A record was written
    Created,
    /// A record was deleted
    Removed,
    /// The record was already in the requested state (no-op)
    Unchanged,
}

/// A published DNS route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRoute {
    /// Provider record ID
    pub id: String,
    /// Record name (full hostname)
    pub hostname: String,
    /// Record content, e.g. `<tunnel>.cfargotunnel.com`
    pub target: String,
}

/// Trait for DNS control plane implementations
///
/// # Idempotency
///
/// Both mutations are idempotent in intent even though the provider API is
/// not:
/// - `create_route` on a record that already points at this tunnel returns
///   `Ok(RouteChange::Unchanged)`
/// - `remove_route` on a record that does not exist returns
///   `Ok(RouteChange::Unchanged)`; this is what lets it compensate a create
///   that failed before the provider wrote anything
///
/// # Retry
///
/// Implementations must not retry. A failed step is surfaced to the
/// coordinator, which rolls back instead of retrying.
#[async_trait]
pub trait DnsGateway: Send + Sync {
    /// Publish `hostname` pointing at tunnel `tunnel_id`
    ///
    /// # Errors
    ///
    /// - `Error::AlreadyExists`: a record for `hostname` points somewhere else
    /// - `Error::RateLimited`, `Error::Authentication`
    /// - `Error::Http`: transport failure; the record may or may not exist
    async fn create_route(&self, tunnel_id: &str, hostname: &str) -> Result<RouteChange, crate::Error>;

    /// Withdraw the record for `hostname`
    ///
    /// # Errors
    ///
    /// - `Error::Authentication`
    /// - `Error::Http`
    async fn remove_route(&self, tunnel_id: &str, hostname: &str) -> Result<RouteChange, crate::Error>;

    /// Read-only lookup used by health and diff reports
    async fn lookup_route(&self, hostname: &str) -> Result<Option<DnsRoute>, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
