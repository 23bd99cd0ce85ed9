// # HTTP Reachability Probe
//
// Two read-only checks used by listing, health reports and the CLI:
//
// - `HttpProbe`: one GET against the published hostname, bounded by a timeout
// - `check_port_listening`: whether anything accepts connections on a local
//   port before it is exposed
//
// Neither check retries or raises; failures are reported as values.

use async_trait::async_trait;
use orb_core::{Error, Reachability, ReachabilityProbe, Result};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

/// Connect timeout for the local listener check
pub const PORT_CHECK_TIMEOUT: Duration = Duration::from_millis(800);

/// Reachability probe over HTTP(S)
///
/// Redirects are not followed: an authorization gate answering with a
/// redirect to its login page still proves the hostname is served.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    scheme: &'static str,
}

impl HttpProbe {
    /// Create a probe that gives up after `timeout`
    ///
    /// # Errors
    ///
    /// - `Error::Config`: the HTTP client cannot be built
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            scheme: "https",
        })
    }

    /// Probe over plain HTTP instead of HTTPS
    pub fn plain_http(mut self) -> Self {
        self.scheme = "http";
        self
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn probe(&self, hostname: &str) -> Reachability {
        let url = format!("{}://{}", self.scheme, hostname);
        let started = Instant::now();

        match self.client.get(&url).send().await {
            Ok(response) => {
                let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                tracing::debug!("{} answered {} in {} ms", url, response.status(), latency_ms);
                Reachability::Reachable {
                    status: response.status().as_u16(),
                    latency_ms,
                }
            }
            Err(e) => {
                tracing::debug!("Probe of {} failed: {}", url, e);
                let reason = if e.is_timeout() {
                    "timed out".to_string()
                } else if e.is_connect() {
                    "connection failed".to_string()
                } else {
                    e.to_string()
                };
                Reachability::Unreachable { reason }
            }
        }
    }
}

/// Whether anything accepts TCP connections on `127.0.0.1:port`
pub async fn check_port_listening(port: u16) -> bool {
    let addr = ("127.0.0.1", port);
    match tokio::time::timeout(PORT_CHECK_TIMEOUT, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            tracing::debug!("Nothing listening on port {}: {}", port, e);
            false
        }
        Err(_) => {
            tracing::debug!("Connect to port {} timed out", port);
            false
        }
    }
}
