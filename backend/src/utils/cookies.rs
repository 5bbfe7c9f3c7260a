//! Session cookie construction and extraction.
//!
//! The token pair travels as two hardened cookies. The cookie lifetime is a
//! transport concern chosen by the remember-me flag and is independent of
//! the token's own signed expiry.

use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

const REMEMBERED_LIFETIME_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_LIFETIME_SECONDS: i64 = 60 * 60;

/// A `Set-Cookie` value carrying one of the session tokens.
///
/// Always HttpOnly, Secure, and SameSite=Strict.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    name: &'static str,
    value: String,
    max_age_seconds: i64,
}

impl SessionCookie {
    pub fn new(name: &'static str, value: impl Into<String>, max_age_seconds: i64) -> Self {
        Self {
            name,
            value: value.into(),
            max_age_seconds,
        }
    }

    /// A cookie that instructs the client to drop the stored value.
    pub fn expired(name: &'static str) -> Self {
        Self {
            name,
            value: String::new(),
            max_age_seconds: 0,
        }
    }

    /// Build the `Set-Cookie` header value.
    pub fn header_value(&self) -> String {
        format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; Secure; SameSite=Strict",
            self.name, self.value, self.max_age_seconds
        )
    }
}

/// Cookie lifetime in seconds: 7 days when remembered, 1 hour otherwise.
pub fn cookie_lifetime_seconds(remember_me: bool) -> i64 {
    if remember_me {
        REMEMBERED_LIFETIME_SECONDS
    } else {
        DEFAULT_LIFETIME_SECONDS
    }
}

/// Reads a named cookie from the request headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Reads a bearer token from the `Authorization` header.
pub fn read_bearer(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    raw.strip_prefix("Bearer ").map(|token| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_carries_hardening_attributes() {
        let cookie = SessionCookie::new(ACCESS_COOKIE, "tok", 3600);
        let header = cookie.header_value();
        assert!(header.starts_with("accessToken=tok;"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("Secure"));
        assert!(header.contains("SameSite=Strict"));
        assert!(header.contains("Max-Age=3600"));
    }

    #[test]
    fn expired_cookie_clears_value() {
        let header = SessionCookie::expired(REFRESH_COOKIE).header_value();
        assert!(header.starts_with("refreshToken=;"));
        assert!(header.contains("Max-Age=0"));
    }

    #[test]
    fn lifetime_follows_remember_me() {
        assert_eq!(cookie_lifetime_seconds(true), 7 * 24 * 60 * 60);
        assert_eq!(cookie_lifetime_seconds(false), 60 * 60);
    }

    #[test]
    fn reads_named_cookie_among_many() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; accessToken=abc123; lang=en"),
        );
        assert_eq!(read_cookie(&headers, ACCESS_COOKIE).as_deref(), Some("abc123"));
        assert_eq!(read_cookie(&headers, REFRESH_COOKIE), None);
    }

    #[test]
    fn reads_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(read_bearer(&headers).as_deref(), Some("abc123"));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(read_bearer(&headers), None);
    }
}
