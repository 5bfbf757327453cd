use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use uuid::Uuid;

use crate::{
    error::IdentityError,
    models::{AdminIdentity, AdminRole},
    token::SessionToken,
};

// 1. IdentityBackend Contract
/// IdentityBackend
///
/// The consumed side of the Identity Backend: one call to learn who holds a
/// session token, one to terminate it. The HTTP client and the test mock both
/// implement it, so the session guard never knows which one it talks to.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// `GET /admin/session`. Ok only for a complete, valid administrator.
    async fn fetch_session(&self, token: &SessionToken) -> Result<AdminIdentity, IdentityError>;

    /// `POST /admin/logout`. Best-effort; callers never wait on it to clear local state.
    async fn logout(&self, token: &SessionToken) -> Result<(), IdentityError>;
}

/// IdentityState
///
/// The shared handle stored in the application state.
pub type IdentityState = Arc<dyn IdentityBackend>;

// --- Wire format ---

// Every field is optional on the wire so that a partial 200 can be told apart
// from a transport error and rejected explicitly.
#[derive(Deserialize)]
struct SessionPayload {
    admin: Option<AdminPayload>,
}

#[derive(Deserialize)]
struct AdminPayload {
    #[serde(alias = "adminId")]
    admin_id: Option<Uuid>,
    username: Option<String>,
    role: Option<String>,
    #[serde(alias = "accessLevel")]
    access_level: Option<u8>,
}

impl TryFrom<AdminPayload> for AdminIdentity {
    type Error = IdentityError;

    fn try_from(payload: AdminPayload) -> Result<Self, Self::Error> {
        let missing = |field: &str| IdentityError::Malformed(format!("missing {field}"));

        let username = payload
            .username
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| missing("username"))?;
        let role = payload
            .role
            .ok_or_else(|| missing("role"))?
            .parse::<AdminRole>()
            .map_err(IdentityError::Malformed)?;

        Ok(AdminIdentity {
            admin_id: payload.admin_id.ok_or_else(|| missing("admin_id"))?,
            username,
            role,
            access_level: payload.access_level.ok_or_else(|| missing("access_level"))?,
        })
    }
}

/// parse_session_body
///
/// Decodes a success body into an identity. Anything short of a complete admin
/// record is `Malformed`.
pub fn parse_session_body(body: &[u8]) -> Result<AdminIdentity, IdentityError> {
    let payload: SessionPayload =
        serde_json::from_slice(body).map_err(|e| IdentityError::Malformed(e.to_string()))?;

    payload
        .admin
        .ok_or_else(|| IdentityError::Malformed("missing admin".to_string()))?
        .try_into()
}

// 2. The Real Implementation (HTTP)
/// HttpIdentityBackend
///
/// reqwest client for the Identity Backend. The session token is sent as a
/// bearer credential; the client-level timeout mirrors the guard's bound.
#[derive(Clone)]
pub struct HttpIdentityBackend {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpIdentityBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(&self, err: reqwest::Error) -> IdentityError {
        if err.is_timeout() {
            IdentityError::Timeout(self.timeout)
        } else {
            IdentityError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl IdentityBackend for HttpIdentityBackend {
    async fn fetch_session(&self, token: &SessionToken) -> Result<AdminIdentity, IdentityError> {
        let response = self
            .client
            .get(self.endpoint("/admin/session"))
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(IdentityError::Rejected(status.as_u16()))
            }
            s if s.is_success() => {
                let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
                parse_session_body(&body)
            }
            s => Err(IdentityError::Unavailable(s.as_u16())),
        }
    }

    async fn logout(&self, token: &SessionToken) -> Result<(), IdentityError> {
        let response = self
            .client
            .post(self.endpoint("/admin/logout"))
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        // A session the backend no longer knows is already terminated.
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            Err(IdentityError::Unavailable(status.as_u16()))
        }
    }
}

// 3. The Mock Implementation (For Tests)
/// MockIdentityBackend
///
/// Scripted Identity Backend used by the tests. Counts calls, can delay answers
/// to hold a resolution in flight, and its outcome can be swapped between calls.
pub struct MockIdentityBackend {
    outcome: Mutex<Result<AdminIdentity, IdentityError>>,
    delay: Duration,
    logout_delay: Duration,
    session_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl MockIdentityBackend {
    pub fn granting(identity: AdminIdentity) -> Self {
        Self::with_outcome(Ok(identity))
    }

    pub fn rejecting() -> Self {
        Self::with_outcome(Err(IdentityError::Rejected(401)))
    }

    pub fn failing(err: IdentityError) -> Self {
        Self::with_outcome(Err(err))
    }

    fn with_outcome(outcome: Result<AdminIdentity, IdentityError>) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            delay: Duration::ZERO,
            logout_delay: Duration::ZERO,
            session_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_logout_delay(mut self, delay: Duration) -> Self {
        self.logout_delay = delay;
        self
    }

    pub fn set_outcome(&self, outcome: Result<AdminIdentity, IdentityError>) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = outcome;
    }

    pub fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityBackend for MockIdentityBackend {
    async fn fetch_session(&self, _token: &SessionToken) -> Result<AdminIdentity, IdentityError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn logout(&self, _token: &SessionToken) -> Result<(), IdentityError> {
        if !self.logout_delay.is_zero() {
            tokio::time::sleep(self.logout_delay).await;
        }
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
