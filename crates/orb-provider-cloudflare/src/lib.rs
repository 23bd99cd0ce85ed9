// # Cloudflare Backends
//
// This crate provides the Cloudflare implementations of two orb collaborators:
//
// - `CloudflareDns`: `DnsGateway` over the DNS API (proxied CNAME records to
//   `<tunnel-id>.cfargotunnel.com`)
// - `CloudflareAccess`: `AccessPolicy` and `GroupDirectory` over Zero Trust
//   Access (applications, app-scoped policies, groups)
//
// ## Constraints
//
// - One logical operation per trait call; no retries, no backoff, no caching.
//   A failed call is surfaced and the coordinator rolls back.
// - Transport failures and 5xx responses are `Error::Http` so the coordinator
//   can treat the write as "maybe applied".
// - No background tasks.
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - API token MUST be provided via environment variables only
// - Construction fails fast if the token is empty

pub mod access;
pub mod api;
pub mod dns;

pub use access::CloudflareAccess;
pub use api::CloudflareClient;
pub use dns::CloudflareDns;

use orb_core::{Error, ProviderConfig, Result};

/// The Cloudflare collaborators built from one provider config
#[derive(Debug, Clone)]
pub struct CloudflareBackends {
    /// DNS gateway for the configured zone
    pub dns: CloudflareDns,

    /// Access backend; `None` when no account ID is configured
    pub access: Option<CloudflareAccess>,
}

/// Factory for the Cloudflare backends
pub struct CloudflareFactory;

impl CloudflareFactory {
    /// Build the backends for `config`
    ///
    /// # Parameters
    ///
    /// - `config`: provider configuration (token, zone, optional account)
    /// - `dry_run`: log writes instead of sending them
    ///
    /// # Errors
    ///
    /// - `Error::Config`: missing token or zone
    pub fn create(&self, config: &ProviderConfig, dry_run: bool) -> Result<CloudflareBackends> {
        match config {
            ProviderConfig::Cloudflare {
                api_token,
                zone_id,
                account_id,
            } => {
                if api_token.is_empty() {
                    return Err(Error::config("Cloudflare API token is required"));
                }
                if zone_id.is_empty() {
                    return Err(Error::config("Cloudflare zone ID is required"));
                }

                if dry_run {
                    tracing::warn!("Cloudflare backends running in DRY-RUN mode - no changes will be made");
                }

                let client = CloudflareClient::new(api_token.clone(), dry_run)?;
                let access = account_id
                    .as_deref()
                    .filter(|id| !id.is_empty())
                    .map(|id| CloudflareAccess::new(client.clone(), id));

                Ok(CloudflareBackends {
                    dns: CloudflareDns::new(client, zone_id.clone()),
                    access,
                })
            }
        }
    }
}
