// # Cloudflare DNS Gateway
//
// Publishes hostnames as proxied CNAME records pointing at
// `<tunnel-id>.cfargotunnel.com`.
//
// ## API Reference
//
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=CNAME`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use crate::api::{self, CloudflareClient, PROVIDER};
use async_trait::async_trait;
use orb_core::{DnsGateway, DnsRoute, Error, Result, RouteChange};
use reqwest::Method;
use serde_json::Value;

/// Suffix Cloudflare serves tunnels under
pub const TUNNEL_SUFFIX: &str = "cfargotunnel.com";

/// DNS target for a tunnel
pub fn tunnel_target(tunnel_id: &str) -> String {
    format!("{}.{}", tunnel_id, TUNNEL_SUFFIX)
}

/// Cloudflare DNS gateway for one zone
#[derive(Debug, Clone)]
pub struct CloudflareDns {
    client: CloudflareClient,
    zone_id: String,
}

impl CloudflareDns {
    /// Create a gateway for `zone_id`
    pub fn new(client: CloudflareClient, zone_id: impl Into<String>) -> Self {
        Self {
            client,
            zone_id: zone_id.into(),
        }
    }

    fn records_path(&self) -> String {
        format!("/zones/{}/dns_records", self.zone_id)
    }

    /// List the CNAME records named `hostname`
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=api.example.com&type=CNAME
    /// Authorization: Bearer <token>
    /// ```
    async fn cname_records(&self, hostname: &str) -> Result<Vec<DnsRoute>> {
        let result = self
            .client
            .get(&self.records_path(), &[("name", hostname), ("type", "CNAME")])
            .await?;
        parse_records(&result)
    }
}

/// Parse a `dns_records` listing
pub(crate) fn parse_records(result: &Value) -> Result<Vec<DnsRoute>> {
    api::array(result, "dns_records")?
        .iter()
        .map(|record| {
            Ok(DnsRoute {
                id: api::str_field(record, "id", "record")?.to_string(),
                hostname: api::str_field(record, "name", "record")?.to_string(),
                target: api::str_field(record, "content", "record")?.to_string(),
            })
        })
        .collect()
}

/// Body of the create request
pub(crate) fn cname_payload(hostname: &str, target: &str) -> Value {
    serde_json::json!({
        "type": "CNAME",
        "name": hostname,
        "content": target,
        "proxied": true,
        "ttl": 1,
    })
}

fn points_at(record: &DnsRoute, target: &str) -> bool {
    record.target.eq_ignore_ascii_case(target)
}

/// Decide what `create_route` has to do given the existing records
///
/// Returns `Ok(true)` when a record must be written and `Ok(false)` when one
/// already points at `target`.
pub(crate) fn needs_create(hostname: &str, existing: &[DnsRoute], target: &str) -> Result<bool> {
    if existing.iter().any(|record| points_at(record, target)) {
        return Ok(false);
    }
    match existing.first() {
        Some(other) => Err(Error::already_exists(format!(
            "DNS record {} already points at {}; remove it in the Cloudflare dashboard first",
            hostname, other.target
        ))),
        None => Ok(true),
    }
}

#[async_trait]
impl DnsGateway for CloudflareDns {
    async fn create_route(&self, tunnel_id: &str, hostname: &str) -> Result<RouteChange> {
        let target = tunnel_target(tunnel_id);
        let existing = self.cname_records(hostname).await?;

        if !needs_create(hostname, &existing, &target)? {
            tracing::info!("DNS record already routes {} to {}", hostname, target);
            return Ok(RouteChange::Unchanged);
        }

        tracing::info!(
            "Creating CNAME {} -> {} [mode: {}]",
            hostname,
            target,
            if self.client.is_dry_run() { "DRY-RUN" } else { "LIVE" }
        );
        let created = self
            .client
            .send(
                Method::POST,
                &self.records_path(),
                Some(&cname_payload(hostname, &target)),
            )
            .await;

        match created {
            Ok(_) => Ok(RouteChange::Created),
            // Lost a race with another writer, or the listing lagged behind
            Err(Error::AlreadyExists(message)) => {
                let current = self.cname_records(hostname).await?;
                if current.iter().any(|record| points_at(record, &target)) {
                    tracing::info!("DNS record for {} appeared concurrently; keeping it", hostname);
                    Ok(RouteChange::Unchanged)
                } else {
                    Err(Error::AlreadyExists(message))
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn remove_route(&self, tunnel_id: &str, hostname: &str) -> Result<RouteChange> {
        let target = tunnel_target(tunnel_id);
        let existing = self.cname_records(hostname).await?;

        let (ours, foreign): (Vec<_>, Vec<_>) =
            existing.into_iter().partition(|record| points_at(record, &target));

        for record in &foreign {
            tracing::warn!(
                "Leaving DNS record {} -> {} in place: it does not point at this tunnel",
                record.hostname,
                record.target
            );
        }

        if ours.is_empty() {
            tracing::debug!("No DNS record routes {} to {}", hostname, target);
            return Ok(RouteChange::Unchanged);
        }

        for record in &ours {
            tracing::info!("Deleting CNAME {} -> {}", record.hostname, record.target);
            self.client
                .send(
                    Method::DELETE,
                    &format!("{}/{}", self.records_path(), record.id),
                    None,
                )
                .await?;
        }

        Ok(RouteChange::Removed)
    }

    async fn lookup_route(&self, hostname: &str) -> Result<Option<DnsRoute>> {
        Ok(self.cname_records(hostname).await?.into_iter().next())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
