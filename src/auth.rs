use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    AppState,
    gate::{Access, Requirement},
    models::{AdminIdentity, Capability, CapabilitySet, SessionStatus, SessionView},
    session::AdminSession,
    token::{self, SessionToken, TokenCheck},
};

pub const LOGIN_PATH: &str = "/admin/login";
pub const DASHBOARD_PATH: &str = "/admin/dashboard";
const API_PREFIX: &str = "/admin/api/";

/// CurrentAdmin
///
/// The authenticated administrator of the current request. Inserted into the
/// request extensions by `require_admin` and extracted by protected handlers,
/// so every handler sees the capability set computed once at resolution.
#[derive(Debug, Clone)]
pub struct CurrentAdmin {
    pub identity: AdminIdentity,
    pub capabilities: CapabilitySet,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl CurrentAdmin {
    /// Some only for an authenticated session.
    pub fn from_session(session: &AdminSession) -> Option<Self> {
        let identity = session.identity()?.clone();
        Some(Self {
            identity,
            capabilities: session.capabilities().clone(),
            resolved_at: session.resolved_at(),
        })
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            status: SessionStatus::Authenticated,
            admin: Some(self.identity.clone()),
            capabilities: self.capabilities.iter().collect(),
            resolved_at: self.resolved_at,
        }
    }
}

/// Rejection: 401 when the middleware did not run or did not admit the request.
impl<S> FromRequestParts<S> for CurrentAdmin
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentAdmin>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

/// resolve_request_session
///
/// Resolves the admin session behind a request's token through the registry.
///
/// 1. Token extraction: cookie, then bearer header. None means no session.
/// 2. Local pre-check: a token that fails signature validation never reaches
///    the backend; an expired one fires the expiry transition on its guard.
/// 3. Resolution: the registry guard queries the Identity Backend, coalescing
///    with any concurrent request of the same session.
///
/// Unauthenticated guards are dropped from the registry at once; idle ones are
/// evicted by the registry itself.
pub async fn resolve_request_session(state: &AppState, headers: &HeaderMap) -> Option<AdminSession> {
    let token = SessionToken::from_headers(headers, &state.config.session_cookie)?;

    match token::inspect(&token, &state.config.jwt_secret) {
        TokenCheck::Valid(claims) => debug!(admin_id = %claims.sub, "session token passed local check"),
        TokenCheck::Expired => {
            debug!("session token expired");
            if let Some(guard) = state.sessions.remove(&token).await {
                guard.expire();
            }
            return None;
        }
        TokenCheck::Invalid => {
            debug!("session token failed local check");
            return None;
        }
    }

    let guard = state.sessions.guard_for(&token).await;
    let session = guard.resolve().await;
    if session.status() == SessionStatus::Unauthenticated {
        state.sessions.remove(&token).await;
    }
    Some(session)
}

/// require_admin
///
/// Middleware enforcing `requireAuthenticated` for the protected routes.
/// Anything but a granted session is denied: HTML requests are redirected to
/// the login view, `/admin/api/*` requests get 401. A still-`Unknown` session
/// (a logout raced the resolution) is denied too.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let is_api = request.uri().path().starts_with(API_PREFIX);

    let admitted = resolve_request_session(&state, request.headers())
        .await
        .filter(|session| session.access(Requirement::Authenticated) == Access::Granted)
        .as_ref()
        .and_then(CurrentAdmin::from_session);

    match admitted {
        Some(admin) => {
            request.extensions_mut().insert(admin);
            next.run(request).await
        }
        None if is_api => StatusCode::UNAUTHORIZED.into_response(),
        None => Redirect::to(LOGIN_PATH).into_response(),
    }
}
