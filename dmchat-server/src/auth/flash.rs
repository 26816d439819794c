//! Flash messages
//!
//! A flash is a short notice ("Logged in successfully!") shown once on the
//! next rendered page. Pending flashes travel in the `dmchat_flash` cookie as
//! base64url-encoded JSON, so anonymous visitors get them without a session.

use std::convert::Infallible;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::response::{IntoResponseParts, ResponseParts};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::session::{read_cookie, SessionConfig, SetCookie};

/// Name of the flash cookie
pub const FLASH_COOKIE: &str = "dmchat_flash";

/// Shown in place of internal errors.
pub const GENERIC_ERROR: &str = "Something went wrong. Please try again.";

/// Upper bound on queued flashes; older ones are dropped first.
const MAX_PENDING: usize = 8;

/// Flash severity, used as a CSS class when rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Error,
    Info,
}

impl FlashLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub text: String,
}

/// Flash queue for one request/response cycle.
///
/// Extract it, push or [`take`](Self::take) messages, and return it as part
/// of the response so the cookie is updated or cleared.
#[derive(Debug, Default, Clone)]
pub struct Flashes {
    had_cookie: bool,
    secure: bool,
    pending: Vec<Flash>,
}

impl Flashes {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        match read_cookie(headers, FLASH_COOKIE) {
            Some(raw) => Self {
                had_cookie: true,
                secure: false,
                pending: decode(raw).unwrap_or_default(),
            },
            None => Self::default(),
        }
    }

    /// Mark the outgoing cookie `Secure`.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn push(&mut self, level: FlashLevel, text: impl Into<String>) {
        if self.pending.len() >= MAX_PENDING {
            self.pending.remove(0);
        }
        self.pending.push(Flash {
            level,
            text: text.into(),
        });
    }

    pub fn success(&mut self, text: impl Into<String>) {
        self.push(FlashLevel::Success, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.push(FlashLevel::Error, text);
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.push(FlashLevel::Info, text);
    }

    /// Drop everything queued so far.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Remove and return all queued flashes for display.
    pub fn take(&mut self) -> Vec<Flash> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &[Flash] {
        &self.pending
    }

    fn set_cookie(&self) -> Option<SetCookie> {
        if !self.pending.is_empty() {
            let value = encode(&self.pending)?;
            Some(SetCookie::new(FLASH_COOKIE, &value, None, self.secure))
        } else if self.had_cookie {
            Some(SetCookie::new(FLASH_COOKIE, "", Some(0), self.secure))
        } else {
            None
        }
    }
}

fn encode(flashes: &[Flash]) -> Option<String> {
    match serde_json::to_vec(flashes) {
        Ok(json) => Some(URL_SAFE_NO_PAD.encode(json)),
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode flash messages");
            None
        }
    }
}

fn decode(raw: &str) -> Option<Vec<Flash>> {
    let bytes = URL_SAFE_NO_PAD.decode(raw).ok()?;
    serde_json::from_slice(&bytes).ok()
}

impl<S> FromRequestParts<S> for Flashes
where
    S: Send + Sync,
    SessionConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let secure = SessionConfig::from_ref(state).secure_cookies;
        Ok(Self::from_headers(&parts.headers).with_secure(secure))
    }
}

impl IntoResponseParts for Flashes {
    type Error = Infallible;

    fn into_response_parts(self, res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        match self.set_cookie() {
            Some(cookie) => cookie.into_response_parts(res),
            None => Ok(res),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;
    use axum::http::HeaderValue;

    fn with_cookie(flashes: &Flashes) -> HeaderMap {
        let value = encode(flashes.pending()).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{}={}", FLASH_COOKIE, value)).unwrap(),
        );
        headers
    }

    #[test]
    fn survives_a_redirect() {
        let mut outgoing = Flashes::default();
        outgoing.error("Incorrect password.");
        outgoing.info("Try again");

        let mut incoming = Flashes::from_headers(&with_cookie(&outgoing));
        let shown = incoming.take();
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0].level, FlashLevel::Error);
        assert_eq!(shown[0].text, "Incorrect password.");
        assert!(incoming.pending().is_empty());
    }

    #[test]
    fn consumed_flashes_clear_the_cookie() {
        let mut outgoing = Flashes::default();
        outgoing.success("ok");
        let mut incoming = Flashes::from_headers(&with_cookie(&outgoing));
        incoming.take();

        let cookie = incoming.set_cookie().expect("clearing cookie");
        let value = cookie.header_value().unwrap().to_str().unwrap();
        assert!(value.starts_with("dmchat_flash=;"));
        assert!(value.contains("Max-Age=0"));
    }

    #[test]
    fn no_cookie_no_header() {
        assert!(Flashes::default().set_cookie().is_none());
    }

    #[test]
    fn tampered_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("dmchat_flash=%%%garbage"));
        let flashes = Flashes::from_headers(&headers);
        assert!(flashes.pending().is_empty());
        // still cleared on the way out
        assert!(flashes.set_cookie().is_some());
    }

    #[test]
    fn secure_flag_reaches_the_cookie() {
        let mut flashes = Flashes::default().with_secure(true);
        flashes.error("nope");
        let cookie = flashes.set_cookie().unwrap();
        let value = cookie.header_value().unwrap().to_str().unwrap();
        assert!(value.ends_with("; Secure"));

        let mut plain = Flashes::default();
        plain.error("nope");
        let cookie = plain.set_cookie().unwrap();
        assert!(!cookie.header_value().unwrap().to_str().unwrap().contains("Secure"));
    }

    #[test]
    fn queue_is_bounded() {
        let mut flashes = Flashes::default();
        for i in 0..20 {
            flashes.info(format!("n{}", i));
        }
        assert_eq!(flashes.pending().len(), MAX_PENDING);
        assert_eq!(flashes.pending()[0].text, "n12");
    }
}
