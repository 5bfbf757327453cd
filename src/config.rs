use std::{env, time::Duration};

/// AppConfig
///
/// Holds the console's configuration. Loaded once at startup and shared through
/// the application state; never mutated afterwards.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls secret handling and log format.
    pub env: Env,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Base URL of the Identity Backend (`GET /admin/session`, `POST /admin/logout`).
    pub identity_url: String,
    // Secret shared with the Identity Backend, used to pre-check HS256 session tokens.
    pub jwt_secret: String,
    // Name of the cookie carrying the admin session token.
    pub session_cookie: String,
    // Upper bound on a single session resolution against the Identity Backend.
    pub resolve_timeout: Duration,
    // A session unused for this long is dropped from the registry.
    pub session_idle_timeout: Duration,
}

/// Env
///
/// Runtime context. Local allows fallback secrets and pretty logs; Production
/// demands every secret explicitly and logs JSON.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

pub const DEFAULT_SESSION_COOKIE: &str = "admin_session";
pub const DEFAULT_RESOLVE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 30 * 60;
const LOCAL_JWT_SECRET: &str = "admin-console-local-session-secret";

impl Default for AppConfig {
    /// Safe, non-panicking values for test state setup.
    fn default() -> Self {
        Self {
            env: Env::Local,
            bind_addr: "127.0.0.1:3000".to_string(),
            identity_url: "http://localhost:4000".to_string(),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            resolve_timeout: Duration::from_millis(DEFAULT_RESOLVE_TIMEOUT_MS),
            session_idle_timeout: Duration::from_secs(DEFAULT_SESSION_IDLE_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables, failing fast.
    ///
    /// # Panics
    /// Panics when `IDENTITY_BACKEND_URL` or `SESSION_JWT_SECRET` is missing in
    /// production, or when `RESOLVE_TIMEOUT_MS` or `SESSION_IDLE_TIMEOUT_SECS`
    /// is not a positive integer.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let (identity_url, jwt_secret) = match env {
            Env::Production => (
                env::var("IDENTITY_BACKEND_URL")
                    .expect("FATAL: IDENTITY_BACKEND_URL must be set in production."),
                env::var("SESSION_JWT_SECRET")
                    .expect("FATAL: SESSION_JWT_SECRET must be set in production."),
            ),
            Env::Local => (
                env::var("IDENTITY_BACKEND_URL")
                    .unwrap_or_else(|_| "http://localhost:4000".to_string()),
                env::var("SESSION_JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
            ),
        };

        let resolve_timeout = Duration::from_millis(
            positive_var("RESOLVE_TIMEOUT_MS").unwrap_or(DEFAULT_RESOLVE_TIMEOUT_MS),
        );
        let session_idle_timeout = Duration::from_secs(
            positive_var("SESSION_IDLE_TIMEOUT_SECS").unwrap_or(DEFAULT_SESSION_IDLE_TIMEOUT_SECS),
        );

        Self {
            env,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            // Trailing slashes would double up when joining endpoint paths.
            identity_url: identity_url.trim_end_matches('/').to_string(),
            jwt_secret,
            session_cookie: env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| DEFAULT_SESSION_COOKIE.to_string()),
            resolve_timeout,
            session_idle_timeout,
        }
    }
}

/// None when unset; panics on anything but a positive integer.
fn positive_var(name: &str) -> Option<u64> {
    let raw = env::var(name).ok()?;
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => Some(value),
        _ => panic!("FATAL: {name} must be a positive integer, got {raw:?}"),
    }
}
