use crate::{
    AppState,
    auth::{self, CurrentAdmin, DASHBOARD_PATH, LOGIN_PATH},
    gate::{Access, Requirement},
    models::{AdminSection, SectionSummary, SessionView},
    token::SessionToken,
    views::{DashboardTemplate, LoginTemplate, SectionTemplate},
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use tracing::info;

// --- Public Handlers ---

/// login_view
///
/// [Public Route] Renders the login view, applying `requireUnauthenticated`:
/// a caller whose session resolves `Authenticated` is sent to the dashboard.
pub async fn login_view(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(session) = auth::resolve_request_session(&state, &headers).await {
        if session.access(Requirement::Unauthenticated) == Access::Denied {
            return Redirect::to(DASHBOARD_PATH).into_response();
        }
    }
    LoginTemplate::new(&state.config.identity_url).into_response()
}

/// logout
///
/// [Public Route] Clears the caller's session locally, notifies the Identity
/// Backend in the background, expires the cookie and returns to the login view.
#[utoipa::path(
    post,
    path = "/admin/logout",
    responses((status = 303, description = "Signed out; redirect to login"))
)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let cookie_name = &state.config.session_cookie;
    if let Some(token) = SessionToken::from_headers(&headers, cookie_name) {
        // The backend acknowledgement is not awaited.
        let _ack = state.sessions.detach(&token).await.logout();
        info!("admin signed out");
    }

    let mut response = Redirect::to(LOGIN_PATH).into_response();
    let expired = format!("{cookie_name}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax");
    if let Ok(value) = HeaderValue::from_str(&expired) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}

// --- Protected Handlers (behind `require_admin`) ---

/// dashboard_view
///
/// [Admin Route] Landing page listing the sections the admin may open.
pub async fn dashboard_view(admin: CurrentAdmin) -> DashboardTemplate {
    DashboardTemplate::new(admin)
}

/// section_view
///
/// [Admin Route] One console section. 404 for unknown slugs, 403 when the
/// admin's capability set lacks the section's capability.
pub async fn section_view(
    admin: CurrentAdmin,
    Path(slug): Path<String>,
) -> Result<SectionTemplate, StatusCode> {
    let section = AdminSection::from_slug(&slug).ok_or(StatusCode::NOT_FOUND)?;
    if !admin.can(section.required_capability()) {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(SectionTemplate { admin, section })
}

/// get_session
///
/// [Admin Route] The session as seen by client-rendered views. Only an
/// authenticated session gets here; anything else is a 401 from the middleware.
#[utoipa::path(
    get,
    path = "/admin/api/session",
    responses(
        (status = 200, description = "Current admin session", body = SessionView),
        (status = 401, description = "No authenticated admin session")
    )
)]
pub async fn get_session(admin: CurrentAdmin) -> Json<SessionView> {
    Json(admin.view())
}

/// list_sections
///
/// [Admin Route] Navigation data for client-rendered views.
#[utoipa::path(
    get,
    path = "/admin/api/sections",
    responses(
        (status = 200, description = "Sections with access flags", body = [SectionSummary]),
        (status = 401, description = "No authenticated admin session")
    )
)]
pub async fn list_sections(admin: CurrentAdmin) -> Json<Vec<SectionSummary>> {
    let sections = AdminSection::ALL
        .into_iter()
        .map(|section| SectionSummary {
            section,
            title: section.title().to_string(),
            path: format!("/admin/sections/{}", section.slug()),
            allowed: admin.can(section.required_capability()),
        })
        .collect();
    Json(sections)
}
