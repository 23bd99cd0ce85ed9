//! Command-line definition

use clap::{Parser, Subcommand};

/// orb - publish local services through a Cloudflare tunnel
#[derive(Parser, Debug)]
#[command(name = "orb")]
#[command(about = "Publish local services through a Cloudflare tunnel", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage tunnel routes
    Tunnel {
        #[command(subcommand)]
        command: TunnelCommands,
    },
    /// Manage Cloudflare Access groups
    Access {
        #[command(subcommand)]
        command: AccessCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum TunnelCommands {
    /// Expose a local port at <subdomain>.<DOMAIN>
    Expose {
        /// Subdomain label
        subdomain: String,
        /// Local port
        port: String,
        /// Service type (http, https, tcp, udp, ssh, rdp, smb, unix)
        #[arg(long = "type", default_value = "http")]
        service_type: String,
        /// Who may connect: public, private, or an access group name
        #[arg(long, default_value = "public")]
        access: String,
        /// Lifetime of group access (e.g. 30m, 24h, 7d)
        #[arg(long, default_value = "")]
        expires: String,
    },
    /// Stop exposing a subdomain
    Unexpose {
        /// Subdomain label
        subdomain: String,
    },
    /// Point an exposed subdomain at a different local port
    Update {
        /// Subdomain label
        subdomain: String,
        /// New local port
        port: String,
        /// Service type (http, https, tcp, udp, ssh, rdp, smb, unix)
        #[arg(long = "type", default_value = "http")]
        service_type: String,
    },
    /// List exposed subdomains
    List,
    /// Check one subdomain end to end
    Health {
        /// Subdomain label
        subdomain: String,
    },
    /// Restart the tunnel daemon
    Restart,
    /// Show the tunnel daemon state
    Status,
    /// Show tunnel daemon logs
    Logs {
        /// Only show lines for this subdomain
        subdomain: Option<String>,
        /// Keep streaming new lines
        #[arg(short, long)]
        follow: bool,
        /// Number of lines to show
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
    },
    /// Remove group access from a subdomain, keeping the owner's access
    RevokeAccess {
        /// Subdomain label
        subdomain: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum AccessCommands {
    /// Create an access group with email addresses
    Create {
        /// Group name
        name: String,
        /// Comma-separated member emails
        emails: String,
    },
    /// List all access groups
    List,
    /// Delete an access group
    Delete {
        /// Group name
        name: String,
    },
    /// Add or remove members from an access group
    Update {
        /// Group name
        name: String,
        /// Comma-separated emails to add
        #[arg(short, long)]
        add: Option<String>,
        /// Comma-separated emails to remove
        #[arg(short, long)]
        remove: Option<String>,
    },
    /// Show members of an access group
    Show {
        /// Group name
        name: String,
    },
}
