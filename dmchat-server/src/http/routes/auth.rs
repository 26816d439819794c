//! Registration, login and logout

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::LOCATION, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;

use crate::auth::session::session_id;
use crate::auth::{password, Flashes};
use crate::db::repos::{SessionRepo, UserRepo};
use crate::http::server::AppState;
use crate::models::{Password, Username, ValidationError};
use crate::views;

/// Register and login form body
#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl CredentialsForm {
    /// Validate both fields. A missing field yields the shared
    /// "Username and password required." message.
    fn validate(&self) -> Result<(Username, Password), String> {
        match (Username::new(&self.username), Password::new(&self.password)) {
            (Ok(username), Ok(password)) => Ok((username, password)),
            (Err(ValidationError::Empty { .. }), _) | (_, Err(ValidationError::Empty { .. })) => {
                Err("Username and password required.".to_owned())
            }
            (Err(e), _) | (_, Err(e)) => Err(capitalize(&e.to_string())),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>() + ".",
        None => String::new(),
    }
}

/// GET / - send visitors to the registration form
async fn index() -> Response {
    (StatusCode::FOUND, [(LOCATION, "/register")]).into_response()
}

/// GET /register
async fn register_form(mut flashes: Flashes) -> impl IntoResponse {
    let shown = flashes.take();
    (flashes, Html(views::register_page(&shown)))
}

/// POST /register
async fn register_submit(
    State(state): State<Arc<AppState>>,
    mut flashes: Flashes,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let back = Redirect::to("/register");

    let (username, password) = match form.validate() {
        Ok(valid) => valid,
        Err(message) => {
            flashes.error(message);
            return (flashes, back).into_response();
        }
    };

    let hash = match password::hash_blocking(password).await {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!(error = %e, "password hashing failed");
            flashes.error("Registration failed. Please try again.");
            return (flashes, back).into_response();
        }
    };

    match UserRepo::new(&state.pool).create(&username, &hash).await {
        Ok(Some(user)) => {
            tracing::info!(user_id = user.id, username = %user.username, "user registered");
            flashes.success("✅ Registered Successfully!");
        }
        Ok(None) => {
            flashes.error("Username already exists. Please choose another.");
        }
        Err(e) => {
            tracing::error!(error = %e, "registration insert failed");
            flashes.error("Registration failed. Please try again.");
        }
    }

    (flashes, back).into_response()
}

/// GET /login
async fn login_form(mut flashes: Flashes) -> impl IntoResponse {
    let shown = flashes.take();
    (flashes, Html(views::login_page(&shown)))
}

/// POST /login
async fn login_submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut flashes: Flashes,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let back = Redirect::to("/login");

    let (username, password) = match form.validate() {
        Ok(valid) => valid,
        Err(message) => {
            flashes.error(message);
            return (flashes, back).into_response();
        }
    };

    let user = match UserRepo::new(&state.pool)
        .find_by_username(username.as_str())
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            flashes.error("No such user.");
            return (flashes, back).into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "login lookup failed");
            flashes.error("Login failed. Please try again.");
            return (flashes, back).into_response();
        }
    };

    match password::verify_blocking(password, user.password_hash.clone()).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!(username = %user.username, "incorrect password");
            flashes.error("Incorrect password.");
            return (flashes, back).into_response();
        }
        Err(e) => {
            tracing::error!(user_id = user.id, error = %e, "password verification failed");
            flashes.error("Login failed. Please try again.");
            return (flashes, back).into_response();
        }
    }

    let sessions = SessionRepo::new(&state.pool);

    // Rotate: never reuse a session id presented before login.
    if let Some(old) = session_id(&headers) {
        if let Err(e) = sessions.delete(old).await {
            tracing::warn!(error = %e, "could not delete previous session");
        }
    }

    match sessions.create(user.id, state.config.session.ttl).await {
        Ok(id) => {
            tracing::info!(user_id = user.id, username = %user.username, "user logged in");
            flashes.success("Logged in successfully!");
            (
                state.config.session.cookie(id),
                flashes,
                Redirect::to("/home"),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(user_id = user.id, error = %e, "session creation failed");
            flashes.error("Login failed. Please try again.");
            (flashes, back).into_response()
        }
    }
}

/// GET /logout
async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut flashes: Flashes,
) -> Response {
    if let Some(id) = session_id(&headers) {
        if let Err(e) = SessionRepo::new(&state.pool).delete(id).await {
            tracing::error!(error = %e, "logout could not delete session");
        }
    }

    flashes.clear();
    flashes.success("You have been logged out.");
    (
        state.config.session.clear_cookie(),
        flashes,
        Redirect::to("/login"),
    )
        .into_response()
}

/// Authentication routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/register", get(register_form).post(register_submit))
        .route("/login", get(login_form).post(login_submit))
        .route("/logout", get(logout))
}
