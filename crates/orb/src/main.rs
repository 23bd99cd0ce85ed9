// # orb - tunnel route CLI
//
// This binary is a THIN integration layer:
// 1. Reading configuration from environment variables
// 2. Initializing tracing and the runtime
// 3. Wiring the Cloudflare, systemd and probe collaborators into the
//    `MutationCoordinator`
// 4. Mapping the outcome to an exit code
//
// All routing, DNS and access logic lives in `orb-core` and the collaborator
// crates. See `config.rs` for the environment variables.
//
// ## Example
//
// ```bash
// export DOMAIN=example.com
// export CONFIG_PATH=/etc/cloudflared/config.yml
// export CLOUDFLARE_API_TOKEN=your_token
// export CLOUDFLARE_ZONE_ID=your_zone_id
//
// orb tunnel expose api 8080
// orb tunnel list
// ```

mod cli;
mod commands;
mod config;

use clap::Parser;
use cli::{Cli, Commands};
use commands::App;
use config::Config;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::FmtSubscriber;

/// Exit codes
///
/// - 0: Success
/// - 1: Configuration error
/// - 2: Operation failed; every change was rolled back
/// - 3: Operation failed and the rollback did not complete; manual follow-up
///   needed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrbExitCode {
    /// Operation succeeded (or was already in place)
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Operation failed, state fully recovered
    OperationFailed = 2,
    /// Operation failed, state left inconsistent
    DirtyFailure = 3,
}

impl From<OrbExitCode> for ExitCode {
    fn from(code: OrbExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<&orb_core::Error> for OrbExitCode {
    fn from(err: &orb_core::Error) -> Self {
        match err {
            orb_core::Error::CompensationFailure { .. } => OrbExitCode::DirtyFailure,
            orb_core::Error::Config(_) => OrbExitCode::ConfigError,
            _ => OrbExitCode::OperationFailed,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return OrbExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return OrbExitCode::ConfigError.into();
    }

    // Initialize tracing on stderr so command output stays clean
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.level())
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return OrbExitCode::ConfigError.into();
    }

    debug!("Configuration loaded: {:?}", config.tunnel);

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create tokio runtime: {}", e);
            return OrbExitCode::ConfigError.into();
        }
    };

    let result = rt.block_on(async {
        match run(cli.command, &config).await {
            Ok(()) => OrbExitCode::Success,
            Err(e) => {
                error!("{:?}", e);
                eprintln!("Error: {}", e);
                if e.is_dirty() {
                    eprintln!("Some systems were left inconsistent; fix them by hand before retrying.");
                }
                OrbExitCode::from(&e)
            }
        }
    });

    result.into()
}

/// Run one command
async fn run(command: Commands, config: &Config) -> orb_core::Result<()> {
    let app = App::build(&config.tunnel).await?;

    match command {
        Commands::Tunnel { command } => app.tunnel(command).await,
        Commands::Access { command } => app.access(command).await,
    }
}
