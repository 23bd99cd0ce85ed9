// # systemd Service Controller
//
// Drives the tunnel daemon unit through `systemctl` and reads its journal
// through `journalctl`.
//
// ## Commands
//
// | operation | command                                                  |
// |-----------|----------------------------------------------------------|
// | restart   | `[sudo -n] systemctl restart <unit>`                     |
// | status    | `systemctl is-active <unit>`                             |
// | logs      | `[sudo -n] journalctl -u <unit> -n <N> [-f] --no-pager -o cat` |
//
// `sudo -n` never prompts: a missing sudo rule fails fast with
// `Error::PermissionDenied` instead of hanging on a password prompt.
//
// ## Dry-Run Mode
//
// `restart` logs the command it would run and succeeds. `status` and `logs`
// are read-only and always run.

use async_trait::async_trait;
use orb_core::{Error, LogQuery, LogStream, Result, ServiceConfig, ServiceController, ServiceState};
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio_stream::Stream;
use tokio_stream::wrappers::LinesStream;

/// Exit status systemctl uses for "unit not found"
const EXIT_UNIT_NOT_FOUND: i32 = 5;

/// Service controller backed by systemd
#[derive(Debug, Clone)]
pub struct SystemdController {
    unit: String,
    use_sudo: bool,
    dry_run: bool,
    systemctl: String,
    journalctl: String,
}

impl SystemdController {
    /// Create a controller for `unit`
    ///
    /// # Parameters
    ///
    /// - `unit`: systemd unit name, e.g. `cloudflared`
    /// - `use_sudo`: prefix privileged commands with `sudo -n`
    /// - `dry_run`: log restarts instead of performing them
    pub fn new(unit: impl Into<String>, use_sudo: bool, dry_run: bool) -> Self {
        Self {
            unit: unit.into(),
            use_sudo,
            dry_run,
            systemctl: "systemctl".to_string(),
            journalctl: "journalctl".to_string(),
        }
    }

    /// Create a controller from the service settings
    pub fn from_config(config: &ServiceConfig, dry_run: bool) -> Self {
        Self::new(config.unit.clone(), config.use_sudo, dry_run)
    }

    /// Use different `systemctl` / `journalctl` executables
    pub fn with_programs(mut self, systemctl: impl Into<String>, journalctl: impl Into<String>) -> Self {
        self.systemctl = systemctl.into();
        self.journalctl = journalctl.into();
        self
    }

    /// Unit under control
    pub fn unit(&self) -> &str {
        &self.unit
    }

    fn command(&self, program: &str, args: &[String], privileged: bool) -> Command {
        let mut command = if privileged && self.use_sudo {
            let mut sudo = Command::new("sudo");
            sudo.arg("-n").arg(program);
            sudo
        } else {
            Command::new(program)
        };
        command.args(args).stdin(Stdio::null());
        command
    }

    fn describe(&self, program: &str, args: &[String], privileged: bool) -> String {
        let sudo = if privileged && self.use_sudo { "sudo -n " } else { "" };
        format!("{}{} {}", sudo, program, args.join(" "))
    }
}

/// Arguments for `systemctl restart`
pub fn restart_args(unit: &str) -> Vec<String> {
    vec!["restart".to_string(), unit.to_string()]
}

/// Arguments for `journalctl`
pub fn journal_args(unit: &str, query: &LogQuery) -> Vec<String> {
    let mut args = vec![
        "-u".to_string(),
        unit.to_string(),
        "-n".to_string(),
        query.lines.to_string(),
        "--no-pager".to_string(),
        "-o".to_string(),
        "cat".to_string(),
    ];
    if query.follow {
        args.push("-f".to_string());
    }
    args
}

/// Map `systemctl is-active` output onto a service state
pub fn parse_state(stdout: &str) -> ServiceState {
    match stdout.trim() {
        "active" | "activating" | "reloading" => ServiceState::Running,
        "inactive" | "failed" | "deactivating" => ServiceState::Stopped,
        _ => ServiceState::Unknown,
    }
}

/// Classify a failed `systemctl` invocation
pub fn classify_failure(code: Option<i32>, stderr: &str, unit: &str) -> Error {
    let lower = stderr.to_lowercase();

    if code == Some(EXIT_UNIT_NOT_FOUND) || lower.contains("not found") || lower.contains("could not be found") {
        return Error::ProcessNotFound(format!("unit {} is not installed", unit));
    }

    if lower.contains("access denied")
        || lower.contains("interactive authentication required")
        || lower.contains("a password is required")
        || lower.contains("permission denied")
    {
        return Error::permission_denied(format!(
            "not allowed to manage {} ({}); run as root or grant a sudo rule for systemctl",
            unit,
            stderr.trim()
        ));
    }

    let status = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
    Error::provider("systemd", format!("exit status {}: {}", status, stderr.trim()))
}

fn spawn_error(program: &str, err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::NotFound {
        Error::ProcessNotFound(format!("{} is not installed or not on PATH", program))
    } else {
        Error::Io(err)
    }
}

#[async_trait]
impl ServiceController for SystemdController {
    async fn restart(&self) -> Result<()> {
        let args = restart_args(&self.unit);
        let line = self.describe(&self.systemctl, &args, true);

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would run: {}", line);
            return Ok(());
        }

        tracing::info!("Restarting {}", self.unit);
        let output = self
            .command(&self.systemctl, &args, true)
            .output()
            .await
            .map_err(|e| spawn_error(&self.systemctl, e))?;

        if output.status.success() {
            tracing::info!("Restarted {}", self.unit);
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::warn!("{} failed: {}", line, stderr.trim());
        Err(classify_failure(output.status.code(), &stderr, &self.unit))
    }

    async fn status(&self) -> ServiceState {
        let args = vec!["is-active".to_string(), self.unit.clone()];
        match self.command(&self.systemctl, &args, false).output().await {
            // is-active exits non-zero for inactive units; the text is what matters
            Ok(output) => parse_state(&String::from_utf8_lossy(&output.stdout)),
            Err(e) => {
                tracing::warn!("Could not query {}: {}", self.unit, e);
                ServiceState::Unknown
            }
        }
    }

    fn logs(&self, query: &LogQuery) -> Result<LogStream> {
        let args = journal_args(&self.unit, query);
        tracing::debug!("Reading logs: {}", self.describe(&self.journalctl, &args, true));

        let mut child = self
            .command(&self.journalctl, &args, true)
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.journalctl, e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Other("failed to capture journalctl output".to_string()))?;

        Ok(Box::pin(JournalStream {
            lines: LinesStream::new(BufReader::new(stdout).lines()),
            filter: query.filter.clone(),
            _child: child,
        }))
    }
}

/// Journal lines, optionally filtered by a substring
///
/// Owns the `journalctl` child so that dropping the stream kills a
/// follow-mode reader.
struct JournalStream {
    lines: LinesStream<BufReader<ChildStdout>>,
    filter: Option<String>,
    _child: Child,
}

impl JournalStream {
    fn wants(&self, line: &str) -> bool {
        self.filter.as_deref().is_none_or(|f| line.contains(f))
    }
}

impl Stream for JournalStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.lines).poll_next(cx) {
                Poll::Ready(Some(Ok(line))) => {
                    if self.wants(&line) {
                        return Poll::Ready(Some(Ok(line)));
                    }
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(Error::Io(e)))),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
