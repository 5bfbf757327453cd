use axum::{Router, http::HeaderName, middleware};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Session core: state machine, per-view gates and the per-token registry.
pub mod gate;
pub mod registry;
pub mod session;

// Identity Backend boundary and the credential it consumes.
pub mod error;
pub mod identity;
pub mod token;

// HTTP surface.
pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod views;

use routes::{admin, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use identity::{HttpIdentityBackend, IdentityState, MockIdentityBackend};
pub use registry::SessionRegistry;
pub use session::{AdminSession, AdminSessionGuard};

/// ApiDoc
///
/// OpenAPI document for the JSON endpoints consumed by client-rendered views.
/// Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(handlers::get_session, handlers::list_sections, handlers::logout),
    components(
        schemas(
            models::AdminIdentity, models::AdminRole, models::Capability,
            models::AdminSection, models::SessionStatus, models::SessionView,
            models::SectionSummary,
        )
    ),
    tags(
        (name = "admin-console", description = "Job board admin console session API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared by every request. The session registry is the explicitly passed
/// "current admin" context; there is no global session.
#[derive(Clone)]
pub struct AppState {
    /// Per-token session guards, each wired to the Identity Backend.
    pub sessions: SessionRegistry,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

impl AppState {
    pub fn new(identity: IdentityState, config: AppConfig) -> Self {
        Self {
            sessions: SessionRegistry::new(
                identity,
                config.resolve_timeout,
                config.session_idle_timeout,
            ),
            config,
        }
    }
}

/// create_router
///
/// Assembles public and protected routes, applies the session middleware to
/// the protected ones and wraps everything in the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Protected views: requireAuthenticated runs before every handler.
        .merge(
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_admin,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one HTTP request, correlated by its `x-request-id`. Headers other
/// than the request id are never recorded; they carry session tokens.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
