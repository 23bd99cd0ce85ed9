// # Reachability Probe Trait
//
// Best-effort check that a published hostname answers from the public side.
// Used by `list` and `health`; never lock-guarded and never fails the caller.

use async_trait::async_trait;
use std::fmt;

/// Result of probing one hostname
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reachability {
    /// The hostname answered (any HTTP status counts as an answer)
    Reachable {
        /// HTTP status returned
        status: u16,
        /// Round-trip time in milliseconds
        latency_ms: u64,
    },
    /// No answer within the timeout, or the connection failed
    Unreachable {
        /// Short reason for display
        reason: String,
    },
    /// The target is not probed over HTTP (e.g. `tcp://`, `ssh://`)
    Skipped,
}

impl Reachability {
    /// Whether the hostname answered with a non-error status
    pub fn is_healthy(&self) -> bool {
        matches!(self, Reachability::Reachable { status, .. } if *status < 500)
    }
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reachability::Reachable { status, latency_ms } => {
                write!(f, "{} ({}ms)", status, latency_ms)
            }
            Reachability::Unreachable { reason } => write!(f, "unreachable: {}", reason),
            Reachability::Skipped => f.write_str("not probed"),
        }
    }
}

/// Trait for reachability probes
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Probe `hostname`; implementations bound the wait with their own timeout
    async fn probe(&self, hostname: &str) -> Reachability;
}
