//! The admin session state machine.
//!
//! `Unknown -> {Authenticated, Unauthenticated}`, `Authenticated -> Unknown`
//! on logout or expiry, `Unauthenticated -> Unknown` when a resolution is
//! retried. State lives in a `watch` channel so views can both read it
//! synchronously and subscribe to transitions.

use chrono::{DateTime, Utc};
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    error::{FailureKind, IdentityError, SessionError},
    gate::{Access, GateHandle, Requirement},
    identity::IdentityState,
    models::{AdminIdentity, Capability, CapabilitySet, SessionStatus},
    token::SessionToken,
};

/// AdminSession
///
/// One observable state of the machine. Fields are private so the pairing
/// "identity present iff authenticated" cannot be broken from outside.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminSession {
    status: SessionStatus,
    identity: Option<AdminIdentity>,
    capabilities: CapabilitySet,
    error: Option<SessionError>,
    resolved_at: Option<DateTime<Utc>>,
}

impl AdminSession {
    pub fn unknown() -> Self {
        Self {
            status: SessionStatus::Unknown,
            identity: None,
            capabilities: CapabilitySet::default(),
            error: None,
            resolved_at: None,
        }
    }

    fn authenticated(identity: AdminIdentity) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            capabilities: CapabilitySet::for_identity(&identity),
            identity: Some(identity),
            error: None,
            resolved_at: Some(Utc::now()),
        }
    }

    fn unauthenticated(err: &IdentityError) -> Self {
        Self {
            status: SessionStatus::Unauthenticated,
            identity: None,
            capabilities: CapabilitySet::default(),
            error: Some(SessionError::from(err)),
            resolved_at: Some(Utc::now()),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn identity(&self) -> Option<&AdminIdentity> {
        self.identity.as_ref()
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Diagnostic only. Never consulted for access decisions.
    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// How a view with the given requirement should treat this state.
    pub fn access(&self, requirement: Requirement) -> Access {
        match (self.status, requirement) {
            (SessionStatus::Unknown, _) => Access::Pending,
            (SessionStatus::Authenticated, Requirement::Authenticated)
            | (SessionStatus::Unauthenticated, Requirement::Unauthenticated) => Access::Granted,
            (SessionStatus::Authenticated, Requirement::Unauthenticated)
            | (SessionStatus::Unauthenticated, Requirement::Authenticated) => Access::Denied,
        }
    }
}

// Tracks the single in-flight resolution. `epoch` is bumped by logout and
// expiry so a resolution started before them cannot overwrite their result.
#[derive(Default)]
struct Flight {
    epoch: u64,
    pending: Option<watch::Receiver<Option<AdminSession>>>,
}

struct GuardInner {
    backend: IdentityState,
    token: SessionToken,
    timeout: Duration,
    state: watch::Sender<AdminSession>,
    flight: Mutex<Flight>,
}

/// AdminSessionGuard
///
/// A cheap, cloneable handle on one admin session. Every clone shares the same
/// state and the same in-flight resolution, so it can be handed to as many
/// views as need it instead of living in a global.
#[derive(Clone)]
pub struct AdminSessionGuard {
    inner: Arc<GuardInner>,
}

impl AdminSessionGuard {
    pub fn new(backend: IdentityState, token: SessionToken, timeout: Duration) -> Self {
        let (state, _) = watch::channel(AdminSession::unknown());
        Self {
            inner: Arc::new(GuardInner {
                backend,
                token,
                timeout,
                state,
                flight: Mutex::new(Flight::default()),
            }),
        }
    }

    pub fn snapshot(&self) -> AdminSession {
        self.inner.state.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.state.borrow().status
    }

    pub fn subscribe(&self) -> watch::Receiver<AdminSession> {
        self.inner.state.subscribe()
    }

    /// resolve
    ///
    /// Asks the Identity Backend who holds this session and settles the state.
    /// Concurrent callers share one backend query and all observe its outcome.
    /// Failures of any kind settle to `Unauthenticated`; this never returns an
    /// error and never leaves the state `Unknown` unless a logout or expiry
    /// landed while the query was in flight.
    pub async fn resolve(&self) -> AdminSession {
        let (epoch, mut outcome) = self.join_or_start();

        let settled = outcome
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|session| (*session).clone());

        match settled {
            Some(session) => session,
            None => {
                warn!("admin session resolution ended without a result; failing closed");
                self.inner.settle(
                    epoch,
                    Err(IdentityError::Transport(
                        "session resolution task ended without a result".to_string(),
                    )),
                )
            }
        }
    }

    fn join_or_start(&self) -> (u64, watch::Receiver<Option<AdminSession>>) {
        let mut flight = self.inner.lock_flight();
        if let Some(pending) = &flight.pending {
            debug!("joining in-flight admin session resolution");
            return (flight.epoch, pending.clone());
        }

        let (tx, rx) = watch::channel(None);
        flight.pending = Some(rx.clone());
        let epoch = flight.epoch;

        // A retry from Unauthenticated goes back through Unknown so views show
        // the neutral state instead of a stale denial.
        self.inner.state.send_if_modified(|session| {
            if session.status == SessionStatus::Unauthenticated {
                *session = AdminSession::unknown();
                true
            } else {
                false
            }
        });
        drop(flight);

        // Detached so that a caller giving up does not strand the others.
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = inner.query().await;
            let session = inner.settle(epoch, outcome);
            let _ = tx.send(Some(session));
        });

        (epoch, rx)
    }

    /// logout
    ///
    /// Clears the session locally right away, then tells the Identity Backend in
    /// the background. The returned handle completes when the backend call does;
    /// nothing depends on awaiting it.
    pub fn logout(&self) -> JoinHandle<()> {
        self.inner.clear("logout");

        let backend = Arc::clone(&self.inner.backend);
        let token = self.inner.token.clone();
        tokio::spawn(async move {
            match backend.logout(&token).await {
                Ok(()) => debug!("identity backend acknowledged logout"),
                Err(err) => warn!(error = %err, "identity backend did not acknowledge logout"),
            }
        })
    }

    /// Session expiry: same local transition as logout, no backend call.
    pub fn expire(&self) {
        self.inner.clear("expired");
    }

    /// Calls `on_unauthenticated` once the session settles `Unauthenticated`.
    pub fn require_authenticated<F>(&self, on_unauthenticated: F) -> GateHandle
    where
        F: FnOnce() + Send + 'static,
    {
        GateHandle::spawn(
            self.subscribe(),
            Requirement::Authenticated,
            Box::new(on_unauthenticated),
        )
    }

    /// Calls `on_authenticated` once the session settles `Authenticated`.
    pub fn require_unauthenticated<F>(&self, on_authenticated: F) -> GateHandle
    where
        F: FnOnce() + Send + 'static,
    {
        GateHandle::spawn(
            self.subscribe(),
            Requirement::Unauthenticated,
            Box::new(on_authenticated),
        )
    }
}

impl GuardInner {
    fn lock_flight(&self) -> MutexGuard<'_, Flight> {
        self.flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn query(&self) -> Result<AdminIdentity, IdentityError> {
        debug!("querying identity backend for admin session");
        match tokio::time::timeout(self.timeout, self.backend.fetch_session(&self.token)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(IdentityError::Timeout(self.timeout)),
        }
    }

    fn settle(&self, epoch: u64, outcome: Result<AdminIdentity, IdentityError>) -> AdminSession {
        let mut flight = self.lock_flight();
        if flight.epoch != epoch {
            debug!("discarding admin session resolution that predates a logout");
            return self.state.borrow().clone();
        }
        flight.pending = None;

        let session = match outcome {
            Ok(identity) => {
                info!(
                    admin_id = %identity.admin_id,
                    role = %identity.role,
                    access_level = identity.access_level,
                    "admin session authenticated"
                );
                AdminSession::authenticated(identity)
            }
            Err(err) => {
                match err.kind() {
                    FailureKind::AuthRejected => {
                        info!(error = %err, "admin session rejected")
                    }
                    FailureKind::TransportFailure => {
                        warn!(error = %err, "identity backend failure; failing closed")
                    }
                }
                AdminSession::unauthenticated(&err)
            }
        };

        self.state.send_replace(session.clone());
        session
    }

    fn clear(&self, reason: &'static str) {
        let mut flight = self.lock_flight();
        flight.epoch += 1;
        flight.pending = None;
        self.state.send_replace(AdminSession::unknown());
        info!(reason, "admin session cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AdminRole;
    use uuid::Uuid;

    fn identity(role: AdminRole, access_level: u8) -> AdminIdentity {
        AdminIdentity {
            admin_id: Uuid::from_u128(42),
            username: "ops".to_string(),
            role,
            access_level,
        }
    }

    #[test]
    fn unknown_session_is_pending_for_both_requirements() {
        let session = AdminSession::unknown();
        assert_eq!(session.access(Requirement::Authenticated), Access::Pending);
        assert_eq!(session.access(Requirement::Unauthenticated), Access::Pending);
        assert!(session.identity().is_none());
        assert!(session.capabilities().is_empty());
    }

    #[test]
    fn authenticated_session_carries_identity_and_capabilities() {
        let session = AdminSession::authenticated(identity(AdminRole::Moderator, 2));
        assert_eq!(session.status(), SessionStatus::Authenticated);
        assert!(session.identity().is_some());
        assert!(session.can(Capability::ManageJobs));
        assert!(!session.can(Capability::ViewPayments));
        assert_eq!(session.access(Requirement::Authenticated), Access::Granted);
        assert_eq!(session.access(Requirement::Unauthenticated), Access::Denied);
    }

    #[test]
    fn unauthenticated_session_records_failure_kind() {
        let session = AdminSession::unauthenticated(&IdentityError::Timeout(Duration::from_secs(1)));
        assert!(session.identity().is_none());
        assert!(session.capabilities().is_empty());
        assert_eq!(
            session.error().map(|e| e.kind),
            Some(FailureKind::TransportFailure)
        );
        assert_eq!(session.access(Requirement::Authenticated), Access::Denied);
    }
}
