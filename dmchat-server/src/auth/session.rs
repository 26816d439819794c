//! Session cookie handling
//!
//! The cookie carries only the session UUID; the user it belongs to lives in
//! the `sessions` table.

use std::convert::Infallible;

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponseParts, ResponseParts};
use chrono::Duration;
use uuid::Uuid;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "dmchat_session";

/// Default session lifetime: two weeks
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 14;

const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

/// Session cookie settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a login lasts
    pub ttl: Duration,
    /// Add the `Secure` attribute (only send over HTTPS)
    pub secure_cookies: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            secure_cookies: false,
        }
    }
}

impl SessionConfig {
    /// Sessions lasting `hours`, clamped to between one hour and a year.
    pub fn with_ttl_hours(hours: i64, secure_cookies: bool) -> Self {
        Self {
            ttl: Duration::hours(hours.clamp(1, MAX_SESSION_TTL_HOURS)),
            secure_cookies,
        }
    }

    /// `Set-Cookie` value establishing session `id`.
    pub fn cookie(&self, id: Uuid) -> SetCookie {
        SetCookie::new(
            SESSION_COOKIE,
            &id.to_string(),
            Some(self.ttl.num_seconds().max(0)),
            self.secure_cookies,
        )
    }

    /// `Set-Cookie` value removing the session cookie.
    pub fn clear_cookie(&self) -> SetCookie {
        SetCookie::new(SESSION_COOKIE, "", Some(0), self.secure_cookies)
    }
}

/// Find a cookie value by name across all `Cookie` headers.
pub fn read_cookie<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Session id from the request cookie, if present and well-formed.
pub fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    read_cookie(headers, SESSION_COOKIE).and_then(|v| Uuid::parse_str(v).ok())
}

/// A `Set-Cookie` header, appended so several cookies can be set at once.
#[derive(Debug, Clone)]
pub struct SetCookie(Option<HeaderValue>);

impl SetCookie {
    /// Build a `Path=/; HttpOnly; SameSite=Lax` cookie.
    ///
    /// `value` must already be cookie-safe (no `;`, `,`, whitespace or quotes).
    pub fn new(name: &str, value: &str, max_age: Option<i64>, secure: bool) -> Self {
        let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", name, value);
        if let Some(secs) = max_age {
            cookie.push_str(&format!("; Max-Age={}", secs));
        }
        if secure {
            cookie.push_str("; Secure");
        }

        match HeaderValue::from_str(&cookie) {
            Ok(value) => Self(Some(value)),
            Err(e) => {
                tracing::warn!(cookie = name, error = %e, "dropping unencodable cookie");
                Self(None)
            }
        }
    }

    pub fn header_value(&self) -> Option<&HeaderValue> {
        self.0.as_ref()
    }
}

impl IntoResponseParts for SetCookie {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if let Some(value) = self.0 {
            res.headers_mut().append(SET_COOKIE, value);
        }
        Ok(res)
    }
}
