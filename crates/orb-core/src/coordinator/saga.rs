//! Per-call transaction log
//!
//! Each successful saga step pushes the compensation that undoes it. On
//! failure the log is unwound strictly LIFO. A compensation that fails is not
//! retried; the remaining compensations still run, and everything that could
//! not be undone is reported once as `Error::CompensationFailure`.
//!
//! The log lives for one coordinator call and is never persisted.

use std::fmt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::access::AccessLevel;
use crate::error::Error;
use crate::traits::{AccessPolicy, DnsGateway, RouteStore};

/// One externally visible step of a saga
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Routing file write
    Routes,
    /// DNS record create/remove
    Dns,
    /// Access policy grant/teardown
    Access,
    /// Tunnel daemon restart
    Restart,
}

impl Step {
    /// The external system this step mutates, for operator-facing messages
    pub fn system(&self) -> &'static str {
        match self {
            Step::Routes => "routing file",
            Step::Dns => "DNS record",
            Step::Access => "access policy",
            Step::Restart => "service daemon",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Routes => f.write_str("routes"),
            Step::Dns => f.write_str("dns"),
            Step::Access => f.write_str("access"),
            Step::Restart => f.write_str("restart"),
        }
    }
}

/// Coordinator state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaState {
    /// No call in progress
    Idle,
    /// Host lock acquired, nothing applied yet
    LockHeld,
    /// Routing file written
    RouteApplied,
    /// DNS change applied
    DnsApplied,
    /// Access change applied
    PolicyApplied,
    /// Daemon restarted
    ServiceRestarted,
    /// All steps applied, compensations discarded
    Committed,
    /// Unwinding compensations after a failed step
    RollingBack,
    /// Failed; every applied step was compensated
    Failed,
    /// Failed; at least one compensation failed too
    FailedDirty,
}

impl SagaState {
    /// State reached once `step` has been applied
    pub fn after(step: Step) -> Self {
        match step {
            Step::Routes => SagaState::RouteApplied,
            Step::Dns => SagaState::DnsApplied,
            Step::Access => SagaState::PolicyApplied,
            Step::Restart => SagaState::ServiceRestarted,
        }
    }

    /// Whether this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaState::Committed | SagaState::Failed | SagaState::FailedDirty
        )
    }
}

/// Events emitted while a saga runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SagaEvent {
    /// The state machine moved
    StateChanged {
        /// Operation name (`expose`, `unexpose`, ...)
        operation: &'static str,
        /// Hostname the operation targets
        hostname: String,
        /// New state
        state: SagaState,
    },

    /// A compensation ran
    Compensated {
        /// Step that was undone
        step: Step,
        /// Whether the undo succeeded
        succeeded: bool,
    },
}

/// Inverse action for one applied step
#[derive(Debug, Clone)]
pub(crate) enum Compensation {
    /// Put the routing file back byte-for-byte
    RestoreRoutes { prior: Vec<u8> },
    /// Withdraw a DNS record this call created (tolerates absence)
    RemoveDns { tunnel: String, hostname: String },
    /// Re-publish a DNS record this call removed
    RecreateDns { tunnel: String, hostname: String },
    /// Drop the group rule this call issued
    RevokeGroup { hostname: String },
    /// Tear down the authorization container this call created
    RemovePolicy { hostname: String },
    /// Re-create an authorization container this call tore down
    RestorePolicy {
        hostname: String,
        level: AccessLevel,
        identity: Option<String>,
    },
}

impl Compensation {
    /// Step whose effect this compensation undoes
    pub(crate) fn step(&self) -> Step {
        match self {
            Compensation::RestoreRoutes { .. } => Step::Routes,
            Compensation::RemoveDns { .. } | Compensation::RecreateDns { .. } => Step::Dns,
            Compensation::RevokeGroup { .. }
            | Compensation::RemovePolicy { .. }
            | Compensation::RestorePolicy { .. } => Step::Access,
        }
    }
}

/// Collaborators a compensation may call
pub(crate) struct Systems<'a> {
    pub routes: &'a dyn RouteStore,
    pub dns: &'a dyn DnsGateway,
    pub access: &'a dyn AccessPolicy,
}

impl Systems<'_> {
    async fn undo(&self, compensation: &Compensation) -> Result<(), Error> {
        match compensation {
            Compensation::RestoreRoutes { prior } => self.routes.save_raw(prior).await,
            Compensation::RemoveDns { tunnel, hostname } => {
                self.dns.remove_route(tunnel, hostname).await.map(|_| ())
            }
            Compensation::RecreateDns { tunnel, hostname } => {
                self.dns.create_route(tunnel, hostname).await.map(|_| ())
            }
            Compensation::RevokeGroup { hostname } => {
                self.access.revoke_group(hostname).await.map(|_| ())
            }
            Compensation::RemovePolicy { hostname } => {
                self.access.remove(hostname).await.map(|_| ())
            }
            Compensation::RestorePolicy {
                hostname,
                level,
                identity,
            } => {
                let identity = identity.as_deref().ok_or_else(|| {
                    Error::precondition("no operator identity configured to re-issue the owner rule")
                })?;
                self.access.grant(hostname, level, identity).await.map(|_| ())
            }
        }
    }
}

/// Ordered compensation log for one coordinator call
pub(crate) struct TransactionLog {
    operation: &'static str,
    hostname: String,
    state: SagaState,
    entries: Vec<Compensation>,
    events: Option<mpsc::Sender<SagaEvent>>,
}

impl TransactionLog {
    /// Start a log for a call that already holds the host lock
    pub(crate) fn begin(
        operation: &'static str,
        hostname: impl Into<String>,
        events: Option<mpsc::Sender<SagaEvent>>,
    ) -> Self {
        let mut log = Self {
            operation,
            hostname: hostname.into(),
            state: SagaState::Idle,
            entries: Vec::new(),
            events,
        };
        log.transition(SagaState::LockHeld);
        log
    }

    /// Current state
    #[cfg(test)]
    pub(crate) fn state(&self) -> SagaState {
        self.state
    }

    /// Record that `step` was applied; `undo` reverses it
    pub(crate) fn applied(&mut self, step: Step, undo: Option<Compensation>) {
        if let Some(undo) = undo {
            self.entries.push(undo);
        }
        self.transition(SagaState::after(step));
    }

    /// Queue a compensation without advancing the state.
    ///
    /// Used when a step failed in a way that may still have taken effect.
    pub(crate) fn push_uncertain(&mut self, undo: Compensation) {
        self.entries.push(undo);
    }

    /// End a call that failed before any step was applied
    pub(crate) fn abandon(mut self, reason: &Error) {
        debug_assert!(self.entries.is_empty());
        info!("{} {} aborted before any change: {}", self.operation, self.hostname, reason);
        self.transition(SagaState::Failed);
    }

    /// Discard all compensations
    pub(crate) fn commit(mut self) {
        self.entries.clear();
        self.transition(SagaState::Committed);
        info!("{} {} committed", self.operation, self.hostname);
    }

    /// Unwind every recorded compensation in reverse order
    ///
    /// # Returns
    ///
    /// - `Error::StepFailure` when every compensation succeeded
    /// - `Error::CompensationFailure` when at least one did not
    pub(crate) async fn roll_back(mut self, systems: &Systems<'_>, failed_step: Step, cause: Error) -> Error {
        warn!(
            "{} {}: {} step failed, rolling back {} change(s): {}",
            self.operation,
            self.hostname,
            failed_step,
            self.entries.len(),
            cause
        );
        self.transition(SagaState::RollingBack);

        let mut unreverted = Vec::new();
        while let Some(undo) = self.entries.pop() {
            let step = undo.step();
            match systems.undo(&undo).await {
                Ok(()) => {
                    warn!("Compensated {} step for {}", step, self.hostname);
                    self.emit(SagaEvent::Compensated { step, succeeded: true });
                }
                Err(e) => {
                    error!(
                        "Compensation of {} step for {} failed: {}",
                        step, self.hostname, e
                    );
                    self.emit(SagaEvent::Compensated { step, succeeded: false });
                    unreverted.push((step, e.to_string()));
                }
            }
        }

        if unreverted.is_empty() {
            self.transition(SagaState::Failed);
            Error::StepFailure {
                step: failed_step,
                source: Box::new(cause),
            }
        } else {
            self.transition(SagaState::FailedDirty);
            error!(
                "{} {} left inconsistent state in {} system(s); manual follow-up required",
                self.operation,
                self.hostname,
                unreverted.len()
            );
            Error::CompensationFailure {
                failed_step,
                cause: cause.to_string(),
                unreverted,
            }
        }
    }

    fn transition(&mut self, state: SagaState) {
        self.state = state;
        self.emit(SagaEvent::StateChanged {
            operation: self.operation,
            hostname: self.hostname.clone(),
            state,
        });
    }

    fn emit(&self, event: SagaEvent) {
        if let Some(tx) = &self.events
            && let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(event)
        {
            warn!("Saga event channel full, dropping event");
        }
    }
}
