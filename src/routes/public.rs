use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without an authenticated admin session. Handlers here
/// still resolve the caller's session when they need it (the login view
/// redirects signed-in admins away), but never require it.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for the process manager and load balancer.
        .route("/health", get(|| async { "ok" }))
        // GET /admin/login
        // Login view. Applies requireUnauthenticated: an admin whose session
        // resolves Authenticated is redirected to the dashboard.
        .route("/admin/login", get(handlers::login_view))
        // POST /admin/logout
        // Clears local session state at once, notifies the Identity Backend
        // best-effort and expires the session cookie.
        .route("/admin/logout", post(handlers::logout))
}
