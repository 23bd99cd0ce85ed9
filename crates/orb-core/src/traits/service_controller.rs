// # Service Controller Trait
//
// Controls the long-running tunnel daemon that must reload to pick up routing
// file changes.
//
// ## Implementations
//
// - systemd: `orb-service-systemd` crate (`systemctl` / `journalctl`)

use async_trait::async_trait;
use std::fmt;
use std::pin::Pin;
use tokio_stream::Stream;

/// Observed daemon state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Daemon is up
    Running,
    /// Daemon is installed but not running
    Stopped,
    /// State could not be determined
    Unknown,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Running => f.write_str("running"),
            ServiceState::Stopped => f.write_str("stopped"),
            ServiceState::Unknown => f.write_str("unknown"),
        }
    }
}

/// Parameters for reading daemon logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    /// Number of historical lines to emit first
    pub lines: usize,
    /// Keep streaming new lines until the stream is dropped
    pub follow: bool,
    /// Only emit lines containing this text
    pub filter: Option<String>,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            lines: 50,
            follow: false,
            filter: None,
        }
    }
}

/// Lazy stream of daemon log lines
pub type LogStream = Pin<Box<dyn Stream<Item = Result<String, crate::Error>> + Send + 'static>>;

/// Trait for daemon control implementations
///
/// # Restart Semantics
///
/// `restart` blocks until the process manager answers. There is no partial
/// success: any non-zero exit is an error, and implementations must not retry.
#[async_trait]
pub trait ServiceController: Send + Sync {
    /// Restart the daemon so it reloads the routing file
    ///
    /// # Errors
    ///
    /// - `Error::PermissionDenied`: the caller may not control the unit
    /// - `Error::ProcessNotFound`: the process manager or unit is missing
    async fn restart(&self) -> Result<(), crate::Error>;

    /// Current daemon state; never fails, reports `Unknown` instead
    async fn status(&self) -> ServiceState;

    /// Stream daemon logs
    ///
    /// In follow mode the stream is unbounded. Dropping it must stop the
    /// underlying reader promptly.
    fn logs(&self, query: &LogQuery) -> Result<LogStream, crate::Error>;
}
