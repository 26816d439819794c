//! Custom Axum extractors

use std::sync::Arc;

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};

use super::server::AppState;
use crate::auth::session::session_id;
use crate::auth::{Flashes, GENERIC_ERROR};
use crate::db::repos::{SessionRepo, SessionUser};
use crate::views;

/// The logged-in user. Rejects with a redirect to `/login` otherwise.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionUser);

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.0.user_id
    }

    pub fn username(&self) -> &str {
        &self.0.username
    }
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(id) = session_id(&parts.headers) else {
            return Err(to_login(parts, state, "Please log in first.", false));
        };

        match SessionRepo::new(&state.pool).get_active(id).await {
            Ok(Some(user)) => Ok(Self(user)),
            Ok(None) => {
                tracing::debug!(session = %id, "unknown or expired session");
                Err(to_login(parts, state, "Please log in first.", true))
            }
            Err(e) => {
                tracing::error!(session = %id, error = %e, "session lookup failed");
                Err(to_login(parts, state, GENERIC_ERROR, false))
            }
        }
    }
}

fn to_login(parts: &Parts, state: &AppState, message: &str, stale_cookie: bool) -> Response {
    let session = &state.config.session;
    let mut flashes = Flashes::from_headers(&parts.headers).with_secure(session.secure_cookies);
    flashes.error(message);

    if stale_cookie {
        (session.clear_cookie(), flashes, Redirect::to("/login")).into_response()
    } else {
        (flashes, Redirect::to("/login")).into_response()
    }
}

/// Numeric chat id from the path. Anything else is a 404 page.
#[derive(Debug, Clone, Copy)]
pub struct ChatId(pub i64);

impl<S> FromRequestParts<S> for ChatId
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| not_found())?;

        raw.parse::<i64>().map(Self).map_err(|_| {
            tracing::debug!(chat_id = %raw, "non-numeric chat id");
            not_found()
        })
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Html(views::not_found_page())).into_response()
}
