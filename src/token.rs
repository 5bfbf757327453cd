use axum::http::{HeaderMap, header};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// SessionToken
///
/// The opaque credential an admin presents (cookie or bearer header). It is the
/// key of the session registry and is forwarded verbatim to the Identity Backend.
/// `Debug` is redacted so the token never reaches the logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Extracts the token from the named cookie, falling back to `Authorization: Bearer`.
    pub fn from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<Self> {
        let from_cookie = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|line| line.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == cookie_name)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty());

        let from_bearer = || {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        from_cookie.or_else(from_bearer).map(Self::new)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// Claims
///
/// Payload of the HS256 session token minted by the Identity Backend.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the admin account id.
    pub sub: Uuid,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
}

/// Result of checking a token locally, before any backend call.
#[derive(Debug)]
pub enum TokenCheck {
    Valid(Claims),
    Expired,
    Invalid,
}

/// inspect
///
/// Verifies signature and expiry with the shared secret. The Identity Backend
/// stays the authority on validity; this only short-circuits tokens that can
/// never resolve and turns a passed `exp` into an expiry event.
pub fn inspect(token: &SessionToken, secret: &str) -> TokenCheck {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    match decode::<Claims>(token.expose(), &key, &validation) {
        Ok(data) => TokenCheck::Valid(data.claims),
        Err(e) => match e.kind() {
            ErrorKind::ExpiredSignature => TokenCheck::Expired,
            _ => TokenCheck::Invalid,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_wins_over_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; admin_session=abc.def ; other=1"),
        );
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));

        let token = SessionToken::from_headers(&headers, "admin_session").unwrap();
        assert_eq!(token.expose(), "abc.def");
    }

    #[test]
    fn bearer_header_is_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));

        let token = SessionToken::from_headers(&headers, "admin_session").unwrap();
        assert_eq!(token.expose(), "xyz");
    }

    #[test]
    fn empty_cookie_is_no_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("admin_session="));

        assert!(SessionToken::from_headers(&headers, "admin_session").is_none());
    }

    #[test]
    fn empty_cookie_falls_back_to_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("admin_session= "));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));

        let token = SessionToken::from_headers(&headers, "admin_session").unwrap();
        assert_eq!(token.expose(), "xyz");
    }

    #[test]
    fn debug_output_is_redacted() {
        let token = SessionToken::new("secret-value");
        assert!(!format!("{token:?}").contains("secret-value"));
    }

    #[test]
    fn garbage_token_is_invalid() {
        let token = SessionToken::new("not-a-jwt");
        assert!(matches!(inspect(&token, "secret"), TokenCheck::Invalid));
    }
}
