//! Command handlers
//!
//! Wires the collaborators into a `MutationCoordinator` and renders results.
//! No routing, DNS, or access logic lives here.

use crate::cli::{AccessCommands, TunnelCommands};
use orb_core::{
    AccessPolicy, Change, CoordinatorSettings, DnsStatus, Error, ExposeRequest, FileRouteStore,
    GroupDirectory, MemoryRouteStore, MutationCoordinator, Outcome, PublicOnlyPolicy, Result,
    RouteStore, TunnelConfig,
};
use orb_probe_http::{HttpProbe, check_port_listening};
use orb_provider_cloudflare::{CloudflareAccess, CloudflareFactory};
use orb_service_systemd::SystemdController;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

/// Collaborators wired for one invocation
pub struct App {
    coordinator: MutationCoordinator,
    groups: Option<CloudflareAccess>,
}

impl App {
    /// Build the collaborators from a validated configuration
    ///
    /// In dry-run mode the routing file is read once and all changes stay in
    /// memory.
    pub async fn build(config: &TunnelConfig) -> Result<Self> {
        let backends = CloudflareFactory.create(&config.provider, config.dry_run)?;

        let access: Box<dyn AccessPolicy> = match backends.access.clone() {
            Some(access) => Box::new(access),
            None => {
                debug!("No CLOUDFLARE_ACCOUNT_ID; only public access is available");
                Box::new(PublicOnlyPolicy)
            }
        };

        let routes: Box<dyn RouteStore> = if config.dry_run {
            warn!(
                "DRY-RUN: changes to {} are kept in memory",
                config.routes_path.display()
            );
            Box::new(MemoryRouteStore::with_bytes(
                tokio::fs::read(&config.routes_path).await?,
            ))
        } else {
            Box::new(FileRouteStore::new(&config.routes_path))
        };

        let mut coordinator = MutationCoordinator::new(
            CoordinatorSettings::from_config(config),
            routes,
            Box::new(backends.dns),
            access,
            Box::new(SystemdController::from_config(&config.service, config.dry_run)),
            Box::new(HttpProbe::new(config.probe_timeout())?),
        );

        let mut events = coordinator.subscribe(32);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                debug!("saga: {:?}", event);
            }
        });

        Ok(Self {
            coordinator,
            groups: backends.access,
        })
    }

    fn groups(&self) -> Result<&CloudflareAccess> {
        self.groups.as_ref().ok_or_else(|| {
            Error::config("access groups need CLOUDFLARE_ACCOUNT_ID to be set")
        })
    }

    /// Run a `tunnel` subcommand
    pub async fn tunnel(&self, command: TunnelCommands) -> Result<()> {
        let coordinator = &self.coordinator;

        match command {
            TunnelCommands::Expose {
                subdomain,
                port,
                service_type,
                access,
                expires,
            } => {
                if !matches!(access.as_str(), "" | "public") && self.groups.is_none() {
                    return Err(Error::config(format!(
                        "--access {} needs CLOUDFLARE_ACCOUNT_ID to be set",
                        access
                    )));
                }
                warn_if_not_listening(&port).await;

                let request = ExposeRequest::new(subdomain, port)
                    .service_type(service_type)
                    .access(access)
                    .expires_in(expires);
                let outcome = coordinator.expose(&request).await?;
                print_outcome("Exposed", &outcome);

                if let Some(expires_at) = outcome.grant.as_ref().and_then(|g| g.expires_at) {
                    println!(
                        "Group access expires at {}; run `orb tunnel revoke-access {}` then",
                        expires_at.to_rfc3339(),
                        request.subdomain
                    );
                }
            }
            TunnelCommands::Unexpose { subdomain } => {
                let outcome = coordinator.unexpose(&subdomain).await?;
                println!("Removed https://{} (was {})", outcome.hostname, outcome.target);
            }
            TunnelCommands::Update {
                subdomain,
                port,
                service_type,
            } => {
                warn_if_not_listening(&port).await;
                let outcome = coordinator.update(&subdomain, &port, &service_type).await?;
                print_outcome("Updated", &outcome);
            }
            TunnelCommands::List => {
                let entries = coordinator.list().await?;
                if entries.is_empty() {
                    println!("No subdomains exposed. Run `orb tunnel expose <subdomain> <port>`.");
                    return Ok(());
                }
                println!("{:<40} {:<28} {:<16} STATUS", "HOSTNAME", "TARGET", "ACCESS");
                for entry in entries {
                    println!(
                        "{:<40} {:<28} {:<16} {}",
                        entry.hostname,
                        entry.target,
                        entry.access.to_string(),
                        entry.reachability
                    );
                }
            }
            TunnelCommands::Health { subdomain } => {
                let report = coordinator.health(&subdomain).await?;
                println!("{}", report.hostname);
                println!(
                    "  route:   {}",
                    report.target.as_deref().unwrap_or("not configured")
                );
                let dns = match &report.dns {
                    DnsStatus::Published(route) => format!("CNAME {}", route.target),
                    DnsStatus::Missing => "missing".to_string(),
                    DnsStatus::Unknown(reason) => format!("unknown ({})", reason),
                };
                println!("  dns:     {}", dns);
                println!("  access:  {}", report.access);
                println!("  reach:   {}", report.reachability);
                println!("  service: {}", report.service);
                println!(
                    "  overall: {}",
                    if report.is_healthy() { "healthy" } else { "unhealthy" }
                );
            }
            TunnelCommands::Restart => {
                coordinator.restart().await?;
                println!("Tunnel daemon restarted");
            }
            TunnelCommands::Status => {
                println!("{}", coordinator.status().await);
            }
            TunnelCommands::Logs {
                subdomain,
                follow,
                lines,
            } => {
                let mut stream = coordinator.logs(subdomain.as_deref(), lines, follow)?;
                while let Some(line) = stream.next().await {
                    println!("{}", line?);
                }
            }
            TunnelCommands::RevokeAccess { subdomain } => {
                let outcome = coordinator.revoke_access(&subdomain).await?;
                match outcome.change {
                    Change::Configured => {
                        println!("Revoked group access on {}; owner access remains", outcome.hostname)
                    }
                    Change::AlreadyConfigured => {
                        println!("{} has no group access to revoke", outcome.hostname)
                    }
                }
            }
        }

        Ok(())
    }

    /// Run an `access` subcommand
    pub async fn access(&self, command: AccessCommands) -> Result<()> {
        let groups = self.groups()?;

        match command {
            AccessCommands::Create { name, emails } => {
                let members = split_list(&emails);
                if members.is_empty() {
                    return Err(Error::validation("at least one email address is required"));
                }
                let group = groups.create_group(&name, &members).await?;
                println!("Created access group {:?} with {} member(s)", group.name, group.members.len());
            }
            AccessCommands::List => {
                let all = groups.list_groups().await?;
                if all.is_empty() {
                    println!("No access groups. Run `orb access create <name> <emails>`.");
                }
                for group in all {
                    println!("{:<24} {} member(s)", group.name, group.members.len());
                }
            }
            AccessCommands::Delete { name } => {
                groups.delete_group(&name).await?;
                println!("Deleted access group {:?}", name);
            }
            AccessCommands::Update { name, add, remove } => {
                let add = split_list(add.as_deref().unwrap_or_default());
                let remove = split_list(remove.as_deref().unwrap_or_default());
                if add.is_empty() && remove.is_empty() {
                    return Err(Error::validation("must specify --add or --remove (or both)"));
                }
                let group = groups.update_members(&name, &add, &remove).await?;
                println!("Access group {:?} now has {} member(s)", group.name, group.members.len());
            }
            AccessCommands::Show { name } => {
                let group = groups.find_group(&name).await?;
                println!("Members of {:?} ({}):", group.name, group.members.len());
                for email in &group.members {
                    println!("  - {}", email);
                }
            }
        }

        Ok(())
    }
}

fn print_outcome(verb: &str, outcome: &Outcome) {
    match outcome.change {
        Change::Configured => println!("{} https://{} -> {}", verb, outcome.hostname, outcome.target),
        Change::AlreadyConfigured => println!(
            "https://{} already routes to {}; nothing to do",
            outcome.hostname, outcome.target
        ),
    }
    if let Some(grant) = &outcome.grant {
        println!("Access: {}", grant.level);
    }
}

/// Warn when nothing listens on the local port yet
async fn warn_if_not_listening(port: &str) {
    // Invalid ports are reported by validation
    let Ok(port) = port.parse::<u16>() else {
        return;
    };
    if !check_port_listening(port).await {
        eprintln!(
            "warning: nothing is listening on localhost:{}; requests will fail until it is",
            port
        );
    }
}

/// Split a comma-separated list, dropping blanks
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_comma_separated_emails() {
        assert_eq!(
            split_list(" a@example.com, ,b@example.com,"),
            ["a@example.com", "b@example.com"]
        );
        assert!(split_list("").is_empty());
    }
}
