//! Direct-message chats: start a DM, read and post messages

use std::sync::Arc;

use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;

use crate::auth::{Flashes, GENERIC_ERROR};
use crate::db::repos::{ChatRepo, MessageRepo, UserRepo};
use crate::http::extractors::{ChatId, CurrentUser};
use crate::http::server::AppState;
use crate::models::{MessageBody, ValidationError};
use crate::views;

fn chat_url(chat_id: i64) -> String {
    format!("/chat/{}", chat_id)
}

#[derive(Debug, Deserialize)]
pub struct StartDmForm {
    #[serde(default)]
    pub username: String,
}

/// POST /start_dm - open (or reuse) the DM with another user
async fn start_dm(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    mut flashes: Flashes,
    Form(form): Form<StartDmForm>,
) -> Response {
    let home = Redirect::to("/home");

    let target_name = form.username.trim();
    if target_name.is_empty() {
        flashes.error("No username provided.");
        return (flashes, home).into_response();
    }

    let target = match UserRepo::new(&state.pool).find_by_username(target_name).await {
        Ok(Some(target)) => target,
        Ok(None) => {
            flashes.error("User not found.");
            return (flashes, home).into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "start_dm lookup failed");
            flashes.error("Could not start chat.");
            return (flashes, home).into_response();
        }
    };

    if target.id == user.id() {
        flashes.error("You cannot start a chat with yourself.");
        return (flashes, home).into_response();
    }

    match ChatRepo::new(&state.pool)
        .find_or_create_dm(user.id(), target.id)
        .await
    {
        Ok(dm) => {
            tracing::info!(
                chat_id = dm.id,
                created = dm.created,
                from = user.id(),
                to = target.id,
                "direct message opened"
            );
            (flashes, Redirect::to(&chat_url(dm.id))).into_response()
        }
        Err(e) => {
            tracing::error!(from = user.id(), to = target.id, error = %e, "start_dm failed");
            flashes.error("Could not start chat.");
            (flashes, home).into_response()
        }
    }
}

/// Whether `user` belongs to the chat. Queues "Chat not found." otherwise;
/// unknown chats and other people's chats look the same. A failed lookup
/// queues the generic error instead.
async fn ensure_member(
    state: &AppState,
    user: &CurrentUser,
    chat_id: i64,
    flashes: &mut Flashes,
) -> bool {
    match ChatRepo::new(&state.pool).is_member(chat_id, user.id()).await {
        Ok(true) => true,
        Ok(false) => {
            tracing::info!(chat_id, user_id = user.id(), "chat access denied");
            flashes.error("Chat not found.");
            false
        }
        Err(e) => {
            tracing::error!(chat_id, error = %e, "membership check failed");
            flashes.error(GENERIC_ERROR);
            false
        }
    }
}

/// GET /chat/{id} - messages oldest first
async fn show_chat(
    State(state): State<Arc<AppState>>,
    ChatId(chat_id): ChatId,
    user: CurrentUser,
    mut flashes: Flashes,
) -> Response {
    if !ensure_member(&state, &user, chat_id, &mut flashes).await {
        return (flashes, Redirect::to("/home")).into_response();
    }

    let messages = match MessageRepo::new(&state.pool).list_for_chat(chat_id).await {
        Ok(messages) => {
            flashes.info(loaded_notice(messages.len()));
            messages
        }
        Err(e) => {
            tracing::error!(chat_id, error = %e, "failed to load messages");
            flashes.error("Error loading messages.");
            Vec::new()
        }
    };

    let title = match ChatRepo::new(&state.pool).other_member(chat_id, user.id()).await {
        Ok(Some(name)) => name,
        Ok(None) => format!("Chat {}", chat_id),
        Err(e) => {
            tracing::warn!(chat_id, error = %e, "failed to load chat title");
            format!("Chat {}", chat_id)
        }
    };

    let shown = flashes.take();
    (
        flashes,
        Html(views::chat_page(chat_id, &title, &messages, &shown)),
    )
        .into_response()
}

fn loaded_notice(count: usize) -> String {
    format!("Loaded {} message(s)", count)
}

#[derive(Debug, Deserialize)]
pub struct PostMessageForm {
    #[serde(default)]
    pub body: String,
}

/// POST /chat/{id} - append a message and return to the chat
async fn post_message(
    State(state): State<Arc<AppState>>,
    ChatId(chat_id): ChatId,
    user: CurrentUser,
    mut flashes: Flashes,
    Form(form): Form<PostMessageForm>,
) -> Response {
    let back = Redirect::to(&chat_url(chat_id));

    let body = match MessageBody::new(&form.body) {
        Ok(body) => body,
        Err(ValidationError::Empty { .. }) => {
            flashes.error("Message cannot be empty.");
            return (flashes, back).into_response();
        }
        Err(e) => {
            flashes.error(format!("Could not send message: {}.", e));
            return (flashes, back).into_response();
        }
    };

    if !ensure_member(&state, &user, chat_id, &mut flashes).await {
        return (flashes, Redirect::to("/home")).into_response();
    }

    match MessageRepo::new(&state.pool)
        .create(chat_id, user.id(), &body)
        .await
    {
        Ok(message) => {
            tracing::debug!(chat_id, message_id = message.id, "message posted");
        }
        Err(e) => {
            tracing::error!(chat_id, user_id = user.id(), error = %e, "message insert failed");
            flashes.error("Could not send message.");
        }
    }

    (flashes, back).into_response()
}

/// Chat routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/start_dm", post(start_dm))
        .route("/chat/{id}", get(show_chat).post(post_message))
}
