use moka::{future::Cache, notification::RemovalCause};
use std::{sync::Arc, time::Duration};
use tracing::debug;

use crate::{identity::IdentityState, session::AdminSessionGuard, token::SessionToken};

/// Upper bound on concurrently tracked sessions.
const MAX_SESSIONS: u64 = 10_000;

/// SessionRegistry
///
/// Maps session tokens to their guard so that concurrent requests carrying the
/// same token share one session and one in-flight resolution. Held in the
/// application state and passed explicitly; there is no global session.
///
/// Entries unused for `idle_timeout` are evicted, so sessions whose tab was
/// simply closed do not accumulate. An evicted session is resolved afresh if
/// its token comes back.
#[derive(Clone)]
pub struct SessionRegistry {
    backend: IdentityState,
    resolve_timeout: Duration,
    sessions: Cache<SessionToken, AdminSessionGuard>,
}

impl SessionRegistry {
    pub fn new(backend: IdentityState, resolve_timeout: Duration, idle_timeout: Duration) -> Self {
        let sessions = Cache::builder()
            .max_capacity(MAX_SESSIONS)
            .time_to_idle(idle_timeout)
            .eviction_listener(|_token: Arc<SessionToken>, _guard: AdminSessionGuard, cause: RemovalCause| {
                debug!(?cause, "session guard left the registry");
            })
            .build();

        Self {
            backend,
            resolve_timeout,
            sessions,
        }
    }

    fn new_guard(&self, token: &SessionToken) -> AdminSessionGuard {
        AdminSessionGuard::new(Arc::clone(&self.backend), token.clone(), self.resolve_timeout)
    }

    /// Returns the guard for `token`, creating it in the `Unknown` state.
    /// Every call counts as activity for idle eviction.
    pub async fn guard_for(&self, token: &SessionToken) -> AdminSessionGuard {
        self.sessions
            .get_with(token.clone(), async { self.new_guard(token) })
            .await
    }

    pub async fn remove(&self, token: &SessionToken) -> Option<AdminSessionGuard> {
        self.sessions.remove(token).await
    }

    /// Takes the guard out of the registry, or builds a detached one, so that a
    /// logout can reach the backend even for a session this process never saw.
    pub async fn detach(&self, token: &SessionToken) -> AdminSessionGuard {
        match self.remove(token).await {
            Some(guard) => guard,
            None => self.new_guard(token),
        }
    }

    /// Live sessions, after pending evictions have been applied.
    pub async fn len(&self) -> usize {
        self.sessions.run_pending_tasks().await;
        self.sessions.entry_count() as usize
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
