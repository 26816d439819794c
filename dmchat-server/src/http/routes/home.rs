//! Home page and user search

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::auth::Flashes;
use crate::db::repos::{ChatRepo, UserRepo, UserSummary};
use crate::http::error::ApiError;
use crate::http::extractors::CurrentUser;
use crate::http::server::AppState;
use crate::models::SearchQuery;
use crate::views;

/// GET /home - greeting and the user's chats, newest activity first
async fn home(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    mut flashes: Flashes,
) -> impl IntoResponse {
    let chats = match ChatRepo::new(&state.pool).list_for_user(user.id()).await {
        Ok(chats) => chats,
        Err(e) => {
            tracing::error!(user_id = user.id(), error = %e, "failed to load chats");
            flashes.error("Error loading chats.");
            Vec::new()
        }
    };

    let shown = flashes.take();
    (flashes, Html(views::home_page(user.username(), &chats, &shown)))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// GET /search_users?q= - up to 10 other users whose name contains `q`
async fn search_users(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let Some(query) = SearchQuery::new(&params.q) else {
        return Ok(Json(Vec::new()));
    };

    let users = UserRepo::new(&state.pool).search(&query, user.id()).await?;
    tracing::debug!(q = %query.as_str(), hits = users.len(), "user search");
    Ok(Json(users))
}

/// Home routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/home", get(home))
        .route("/search_users", get(search_users))
}
