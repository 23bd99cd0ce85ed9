// # Cloudflare API v4 client
//
// Thin request layer shared by the DNS and Access backends. Every call is a
// single HTTP request: no retries, no caching. Response envelopes are unwrapped
// to their `result` member and HTTP failures are mapped onto `orb_core::Error`
// so the coordinator can tell definite failures from indeterminate ones.
//
// ## Error mapping
//
// | response                          | error                    |
// |-----------------------------------|--------------------------|
// | transport failure, timeout        | `Error::Http`            |
// | 401, 403                          | `Error::Authentication`  |
// | 404                               | `Error::NotFound`        |
// | 429                               | `Error::RateLimited`     |
// | 5xx                               | `Error::Http`            |
// | 400 with a duplicate-record code  | `Error::AlreadyExists`   |
// | anything else                     | `Error::Provider`        |

use orb_core::{Error, Result};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider name used in errors and logs
pub(crate) const PROVIDER: &str = "cloudflare";

/// Identifier handed back for objects "created" in dry-run mode
pub const DRY_RUN_ID: &str = "dry-run";

/// Error codes Cloudflare returns when an identical or conflicting record exists
const DUPLICATE_CODES: [i64; 3] = [81053, 81057, 81058];

/// One entry of the `errors` array in a Cloudflare response envelope
#[derive(Debug, Clone, Deserialize)]
struct ApiMessage {
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

/// Shared Cloudflare API client
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, GET requests are performed as usual but every
/// mutating request is logged and answered locally with `{"id": "dry-run"}`.
///
/// # Security
///
/// The Debug implementation does NOT expose the API token.
#[derive(Clone)]
pub struct CloudflareClient {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API root, overridable for testing against a local server
    base_url: String,

    client: reqwest::Client,

    dry_run: bool,
}

impl std::fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareClient")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareClient {
    /// Create a new client
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with DNS:Edit (and Access:Edit for
    ///   protected hostnames) permissions
    /// - `dry_run`: If true, perform GET requests but skip writes
    ///
    /// # Errors
    ///
    /// - `Error::Config`: the token is empty or the HTTP client cannot be built
    pub fn new(api_token: impl Into<String>, dry_run: bool) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Point the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether writes are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path` and return the envelope's `result`
    pub(crate) async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = self.url(path);
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        read_result(response, &format!("GET {}", path)).await
    }

    /// Send a mutating request and return the envelope's `result`
    ///
    /// In dry-run mode nothing is sent.
    pub(crate) async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = self.url(path);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send {} request to {} with payload: {}",
                method,
                url,
                body.map(|b| b.to_string()).unwrap_or_default()
            );
            return Ok(serde_json::json!({ "id": DRY_RUN_ID }));
        }

        tracing::debug!("{} {}", method, url);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport_error)?;
        read_result(response, &format!("{} {}", method, path)).await
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    Error::http(format!("Cloudflare request failed: {}", err))
}

async fn read_result(response: reqwest::Response, context: &str) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        return Err(map_status(status.as_u16(), &error_text, context));
    }

    let json: Value = response
        .json()
        .await
        .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;
    unwrap_result(json, context)
}

/// Map a failed HTTP status onto the error taxonomy
pub(crate) fn map_status(status: u16, body: &str, context: &str) -> Error {
    match status {
        401 | 403 => Error::auth(format!(
            "Invalid API token or insufficient permissions ({}). Status: {}",
            context, status
        )),
        404 => Error::not_found(format!("{} returned 404", context)),
        429 => Error::rate_limited(format!("Rate limit exceeded ({}). Please retry later.", context)),
        500..=599 => Error::http(format!(
            "Cloudflare server error ({}): {} - {}",
            context, status, body
        )),
        400 if error_codes(body).iter().any(|code| DUPLICATE_CODES.contains(code)) => {
            Error::already_exists(format!("{}: {}", context, error_messages(body)))
        }
        _ => Error::provider(PROVIDER, format!("{} failed: {} - {}", context, status, body)),
    }
}

/// Unwrap a successful response envelope
///
/// Cloudflare can answer 200 with `"success": false`; that is a provider error.
pub(crate) fn unwrap_result(json: Value, context: &str) -> Result<Value> {
    if json["success"].as_bool() == Some(false) {
        return Err(Error::provider(
            PROVIDER,
            format!("{} failed: {}", context, error_messages(&json.to_string())),
        ));
    }
    Ok(json["result"].clone())
}

fn parse_errors(body: &str) -> Vec<ApiMessage> {
    serde_json::from_str::<Envelope>(body)
        .map(|envelope| envelope.errors)
        .unwrap_or_default()
}

fn error_codes(body: &str) -> Vec<i64> {
    parse_errors(body).into_iter().map(|e| e.code).collect()
}

fn error_messages(body: &str) -> String {
    let errors = parse_errors(body);
    if errors.is_empty() {
        return body.to_string();
    }
    errors
        .iter()
        .map(|e| format!("{} ({})", e.message, e.code))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Read a required string member
pub(crate) fn str_field<'a>(value: &'a Value, field: &str, what: &str) -> Result<&'a str> {
    value[field].as_str().ok_or_else(|| {
        Error::provider(
            PROVIDER,
            format!("Invalid response format: {}.{} is not a string", what, field),
        )
    })
}

/// Read a `result` that must be an array
pub(crate) fn array<'a>(result: &'a Value, what: &str) -> Result<&'a Vec<Value>> {
    result.as_array().ok_or_else(|| {
        Error::provider(
            PROVIDER,
            format!("Invalid response format: {} result is not an array", what),
        )
    })
}
