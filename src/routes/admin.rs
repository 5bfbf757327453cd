use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// The protected views of the console. `create_router` wraps this router in
/// the `require_admin` middleware, so every handler here receives a resolved
/// `CurrentAdmin`. Section-level permissions are checked against the
/// capability set inside the handlers.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/dashboard
        // Landing page listing the sections the admin's capabilities open.
        .route("/admin/dashboard", get(handlers::dashboard_view))
        // GET /admin/sections/{section}
        // users | jobs | payments | refunds | reports | admins.
        // 403 when the capability is missing, 404 for unknown sections.
        .route("/admin/sections/{section}", get(handlers::section_view))
        // GET /admin/api/session
        // Session hydration for client-rendered views: identity, capabilities
        // and resolution time of the authenticated admin.
        .route("/admin/api/session", get(handlers::get_session))
        // GET /admin/api/sections
        // JSON navigation data with an `allowed` flag per section.
        .route("/admin/api/sections", get(handlers::list_sections))
}
