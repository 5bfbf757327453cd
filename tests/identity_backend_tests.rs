use admin_console::{
    AdminSessionGuard, HttpIdentityBackend,
    error::{FailureKind, IdentityError},
    identity::{IdentityBackend, IdentityState},
    models::{AdminRole, SessionStatus},
    token::SessionToken,
};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    routing::{get, post},
};
use serde_json::json;
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::net::TcpListener;

// --- Fake Identity Backend ---

const VALID_TOKEN: &str = "valid-session-token";

/// Binds the router on an ephemeral port and returns its base URL.
async fn spawn_backend(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let address = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    address
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

async fn session_handler(headers: HeaderMap) -> Result<Json<serde_json::Value>, StatusCode> {
    if bearer(&headers) != Some(VALID_TOKEN) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(json!({
        "admin": {
            "adminId": "7f1c1a52-4f0e-4a4e-9d7c-2b1d6f0c9a11",
            "username": "root",
            "role": "super_admin",
            "accessLevel": 3
        }
    })))
}

fn backend_client(base_url: &str) -> HttpIdentityBackend {
    HttpIdentityBackend::new(base_url, Duration::from_secs(2)).expect("client builds")
}

// --- Tests ---

#[tokio::test]
async fn test_valid_session_resolves_identity() {
    let url = spawn_backend(Router::new().route("/admin/session", get(session_handler))).await;
    let backend = backend_client(&url);

    let admin = backend
        .fetch_session(&SessionToken::new(VALID_TOKEN))
        .await
        .expect("valid session");

    assert_eq!(admin.username, "root");
    assert_eq!(admin.role, AdminRole::SuperAdmin);
    assert_eq!(admin.access_level, 3);
}

#[tokio::test]
async fn test_unknown_token_is_rejected() {
    let url = spawn_backend(Router::new().route("/admin/session", get(session_handler))).await;
    let backend = backend_client(&url);

    let err = backend
        .fetch_session(&SessionToken::new("stolen-or-stale"))
        .await
        .unwrap_err();

    assert_eq!(err, IdentityError::Rejected(401));
    assert_eq!(err.kind(), FailureKind::AuthRejected);
}

#[tokio::test]
async fn test_forbidden_is_rejected() {
    let router = Router::new().route("/admin/session", get(|| async { StatusCode::FORBIDDEN }));
    let url = spawn_backend(router).await;

    let err = backend_client(&url)
        .fetch_session(&SessionToken::new(VALID_TOKEN))
        .await
        .unwrap_err();

    assert_eq!(err, IdentityError::Rejected(403));
}

#[tokio::test]
async fn test_partial_success_body_is_rejected() {
    let router = Router::new().route(
        "/admin/session",
        get(|| async { Json(json!({ "admin": { "username": "root" } })) }),
    );
    let url = spawn_backend(router).await;

    let err = backend_client(&url)
        .fetch_session(&SessionToken::new(VALID_TOKEN))
        .await
        .unwrap_err();

    assert!(matches!(err, IdentityError::Malformed(_)));
    assert_eq!(err.kind(), FailureKind::AuthRejected);
}

#[tokio::test]
async fn test_server_error_is_a_transport_failure() {
    let router = Router::new().route(
        "/admin/session",
        get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
    );
    let url = spawn_backend(router).await;

    let err = backend_client(&url)
        .fetch_session(&SessionToken::new(VALID_TOKEN))
        .await
        .unwrap_err();

    assert_eq!(err, IdentityError::Unavailable(503));
    assert_eq!(err.kind(), FailureKind::TransportFailure);
}

#[tokio::test]
async fn test_unreachable_backend_is_a_transport_failure() {
    // Reserve a port, then free it so nothing is listening there.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = backend_client(&url)
        .fetch_session(&SessionToken::new(VALID_TOKEN))
        .await
        .unwrap_err();

    assert!(matches!(err, IdentityError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let router = Router::new().route(
        "/admin/session",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::OK
        }),
    );
    let url = spawn_backend(router).await;
    let backend = HttpIdentityBackend::new(&url, Duration::from_millis(100)).unwrap();

    let err = backend
        .fetch_session(&SessionToken::new(VALID_TOKEN))
        .await
        .unwrap_err();

    assert!(matches!(err, IdentityError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn test_logout_posts_bearer_token() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/admin/logout",
            post(|State(hits): State<Arc<AtomicUsize>>, headers: HeaderMap| async move {
                if bearer(&headers) == Some(VALID_TOKEN) {
                    hits.fetch_add(1, Ordering::SeqCst);
                    StatusCode::NO_CONTENT
                } else {
                    StatusCode::BAD_REQUEST
                }
            }),
        )
        .with_state(hits.clone());
    let url = spawn_backend(router).await;

    backend_client(&url)
        .logout(&SessionToken::new(VALID_TOKEN))
        .await
        .expect("logout acknowledged");

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_guard_over_http_backend() {
    let url = spawn_backend(Router::new().route("/admin/session", get(session_handler))).await;
    let backend = Arc::new(backend_client(&url)) as IdentityState;

    let granted = AdminSessionGuard::new(
        backend.clone(),
        SessionToken::new(VALID_TOKEN),
        Duration::from_secs(2),
    );
    let denied = AdminSessionGuard::new(
        backend,
        SessionToken::new("nope"),
        Duration::from_secs(2),
    );

    assert_eq!(granted.resolve().await.status(), SessionStatus::Authenticated);
    assert_eq!(denied.resolve().await.status(), SessionStatus::Unauthenticated);
}
