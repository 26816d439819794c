//! End-to-end tests against a real PostgreSQL database.
//!
//! Run with: DATABASE_URL=postgres://... cargo test -p dmchat-server -- --ignored

use axum::body::{to_bytes, Body};
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::Response;
use chrono::Duration;
use sqlx::postgres::PgConnectOptions;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use dmchat_server::auth::{password, Flashes};
use dmchat_server::db::repos::{ChatRepo, MessageRepo, SessionRepo, User, UserRepo};
use dmchat_server::db::{create_pool, create_pool_with_connect_options, migrations};
use dmchat_server::models::{MessageBody, Password, SearchQuery, Username};
use dmchat_server::{build_router, AppState, ServerConfig};

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let pool = create_pool(&url).await.expect("pool creation failed");
    migrations::run(&pool).await.expect("migrations failed");
    pool
}

/// Username unique to this test run.
fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..12])
}

async fn user(pool: &PgPool, prefix: &str) -> User {
    let name = Username::new(&unique(prefix)).unwrap();
    let hash = password::hash(&Password::new("pw").unwrap()).unwrap();
    UserRepo::new(pool)
        .create(&name, &hash)
        .await
        .unwrap()
        .expect("fresh username")
}

#[tokio::test]
#[ignore = "requires database"]
async fn migrations_are_idempotent() {
    let pool = pool().await;
    migrations::run(&pool).await.expect("second run");
}

#[tokio::test]
#[ignore = "requires database"]
async fn duplicate_username_is_rejected_without_error() {
    let pool = pool().await;
    let first = user(&pool, "dup").await;

    let again = UserRepo::new(&pool)
        .create(&Username::new(&first.username).unwrap(), "irrelevant")
        .await
        .unwrap();
    assert!(again.is_none());
}

#[tokio::test]
#[ignore = "requires database"]
async fn search_excludes_self_and_matches_case_insensitively() {
    let pool = pool().await;
    let tag = Uuid::new_v4().simple().to_string()[..8].to_owned();
    let me = UserRepo::new(&pool)
        .create(&Username::new(&format!("Me_{}", tag)).unwrap(), "h")
        .await
        .unwrap()
        .unwrap();
    let other = UserRepo::new(&pool)
        .create(&Username::new(&format!("OTHER_{}", tag)).unwrap(), "h")
        .await
        .unwrap()
        .unwrap();

    let query = SearchQuery::new(&tag.to_uppercase()).unwrap();
    let hits = UserRepo::new(&pool).search(&query, me.id).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, other.id);

    // `_` must not act as a wildcard: "O_HER_" would otherwise match "OTHER_"
    let literal = SearchQuery::new(&format!("O_HER_{}", tag)).unwrap();
    assert!(UserRepo::new(&pool).search(&literal, me.id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires database"]
async fn find_or_create_dm_is_idempotent_in_both_directions() {
    let pool = pool().await;
    let a = user(&pool, "a").await;
    let b = user(&pool, "b").await;
    let chats = ChatRepo::new(&pool);

    let first = chats.find_or_create_dm(a.id, b.id).await.unwrap();
    assert!(first.created);

    let again = chats.find_or_create_dm(a.id, b.id).await.unwrap();
    let reversed = chats.find_or_create_dm(b.id, a.id).await.unwrap();
    assert_eq!(again.id, first.id);
    assert_eq!(reversed.id, first.id);
    assert!(!again.created && !reversed.created);

    assert_eq!(chats.find_dm(b.id, a.id).await.unwrap(), Some(first.id));
    assert!(chats.is_member(first.id, a.id).await.unwrap());
    assert_eq!(
        chats.other_member(first.id, a.id).await.unwrap().as_deref(),
        Some(b.username.as_str())
    );
}

#[tokio::test]
#[ignore = "requires database"]
async fn concurrent_dm_creation_yields_one_chat() {
    let pool = pool().await;
    let a = user(&pool, "race-a").await;
    let b = user(&pool, "race-b").await;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let pool = pool.clone();
            let (x, y) = if i % 2 == 0 { (a.id, b.id) } else { (b.id, a.id) };
            tokio::spawn(async move { ChatRepo::new(&pool).find_or_create_dm(x, y).await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.expect("task panicked").expect("dm failed").id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(ChatRepo::new(&pool).list_for_user(a.id).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires database"]
async fn messages_are_ordered_and_bump_the_chat() {
    let pool = pool().await;
    let me = user(&pool, "me").await;
    let old_friend = user(&pool, "old").await;
    let new_friend = user(&pool, "new").await;
    let chats = ChatRepo::new(&pool);
    let messages = MessageRepo::new(&pool);

    let older = chats.find_or_create_dm(me.id, old_friend.id).await.unwrap();
    let newer = chats.find_or_create_dm(me.id, new_friend.id).await.unwrap();

    let listed = chats.list_for_user(me.id).await.unwrap();
    assert_eq!(listed.iter().map(|c| c.id).collect::<Vec<_>>(), vec![newer.id, older.id]);

    for text in ["first", "second", "third"] {
        messages
            .create(older.id, me.id, &MessageBody::new(text).unwrap())
            .await
            .unwrap();
    }

    let listed = chats.list_for_user(me.id).await.unwrap();
    assert_eq!(listed[0].id, older.id);
    assert_eq!(listed[0].other_username, old_friend.username);

    let thread = messages.list_for_chat(older.id).await.unwrap();
    let bodies: Vec<_> = thread.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, ["first", "second", "third"]);
    assert!(thread.iter().all(|m| m.author == me.username));
}

#[tokio::test]
#[ignore = "requires database"]
async fn sessions_expire() {
    let pool = pool().await;
    let u = user(&pool, "sess").await;
    let sessions = SessionRepo::new(&pool);

    let live = sessions.create(u.id, Duration::hours(1)).await.unwrap();
    let dead = sessions.create(u.id, Duration::seconds(-1)).await.unwrap();

    let resolved = sessions.get_active(live).await.unwrap().expect("live session");
    assert_eq!(resolved.user_id, u.id);
    assert_eq!(resolved.username, u.username);
    assert!(sessions.get_active(dead).await.unwrap().is_none());

    assert!(sessions.purge_expired().await.unwrap() >= 1);
    sessions.delete(live).await.unwrap();
    assert!(sessions.get_active(live).await.unwrap().is_none());
}

// ---- HTTP flow ----

fn form(uri: &str, body: String, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

fn get(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn session_cookie(response: &Response) -> String {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|c| c.starts_with("dmchat_session="))
        .and_then(|c| c.split(';').next())
        .expect("session cookie")
        .to_owned()
}

/// Texts carried by the flash cookie of a response.
fn flash_texts(response: &Response) -> Vec<String> {
    let cookie = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|c| c.starts_with("dmchat_flash="))
        .and_then(|c| c.split(';').next())
        .expect("flash cookie")
        .to_owned();
    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, HeaderValue::from_str(&cookie).unwrap());
    Flashes::from_headers(&headers)
        .take()
        .into_iter()
        .map(|f| f.text)
        .collect()
}

async fn login_cookie(pool: &PgPool, user: &User) -> String {
    let session = SessionRepo::new(pool)
        .create(user.id, Duration::hours(1))
        .await
        .unwrap();
    format!("dmchat_session={}", session)
}

fn router(pool: &PgPool) -> axum::Router {
    build_router(AppState {
        pool: pool.clone(),
        config: ServerConfig::default(),
    })
}

async fn text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
#[ignore = "requires database"]
async fn register_login_and_chat_over_http() {
    let pool = pool().await;
    let app = build_router(AppState {
        pool: pool.clone(),
        config: ServerConfig::default(),
    });
    let alice = unique("alice");
    let bob = unique("bob");

    for name in [&alice, &bob] {
        let response = app
            .clone()
            .oneshot(form("/register", format!("username={}&password=pw", name), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/register");
        assert_eq!(flash_texts(&response), ["✅ Registered Successfully!"]);
    }

    let response = app
        .clone()
        .oneshot(form("/register", format!("username={}&password=pw2", alice), None))
        .await
        .unwrap();
    assert_eq!(response.headers()[LOCATION], "/register");
    assert_eq!(
        flash_texts(&response),
        ["Username already exists. Please choose another."]
    );

    let response = app
        .clone()
        .oneshot(form("/login", format!("username={}&password=nope", alice), None))
        .await
        .unwrap();
    assert_eq!(response.headers()[LOCATION], "/login");
    assert_eq!(flash_texts(&response), ["Incorrect password."]);

    let response = app
        .clone()
        .oneshot(form("/login", format!("username={}&password=pw", unique("ghost")), None))
        .await
        .unwrap();
    assert_eq!(response.headers()[LOCATION], "/login");
    assert_eq!(flash_texts(&response), ["No such user."]);

    let response = app
        .clone()
        .oneshot(form("/login", format!("username={}&password=pw", alice), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/home");
    assert_eq!(flash_texts(&response), ["Logged in successfully!"]);
    let cookie = session_cookie(&response);

    let response = app.clone().oneshot(get("/home", &cookie)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains(&format!("Hello, {}", alice)));

    let response = app
        .clone()
        .oneshot(get(&format!("/search_users?q={}", &bob[..8]), &cookie))
        .await
        .unwrap();
    let hits: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
    assert!(hits
        .as_array()
        .unwrap()
        .iter()
        .any(|u| u["username"] == bob.as_str()));

    let response = app
        .clone()
        .oneshot(form("/start_dm", format!("username={}", bob), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let chat_url = response.headers()[LOCATION].to_str().unwrap().to_owned();
    assert!(chat_url.starts_with("/chat/"));

    let response = app
        .clone()
        .oneshot(form(&chat_url, "body=hello+%3Cbob%3E".into(), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.headers()[LOCATION], chat_url.as_str());

    let response = app.clone().oneshot(get(&chat_url, &cookie)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = text(response).await;
    assert!(html.contains(&format!("<h1>{}</h1>", bob)));
    assert!(html.contains("hello &lt;bob&gt;"));
    assert!(html.contains(r#"<div class="flash info" role="status">Loaded 1 message(s)</div>"#));

    // starting the same DM again reuses the chat
    let response = app
        .clone()
        .oneshot(form("/start_dm", format!("username={}", bob), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.headers()[LOCATION], chat_url.as_str());

    // logout invalidates the session server-side
    app.clone().oneshot(get("/logout", &cookie)).await.unwrap();
    let response = app.oneshot(get("/home", &cookie)).await.unwrap();
    assert_eq!(response.headers()[LOCATION], "/login");
}

#[tokio::test]
#[ignore = "requires database"]
async fn outsiders_cannot_read_a_chat() {
    let pool = pool().await;
    let a = user(&pool, "in-a").await;
    let b = user(&pool, "in-b").await;
    let outsider = user(&pool, "out").await;
    let dm = ChatRepo::new(&pool).find_or_create_dm(a.id, b.id).await.unwrap();

    let session = SessionRepo::new(&pool)
        .create(outsider.id, Duration::hours(1))
        .await
        .unwrap();
    let cookie = format!("dmchat_session={}", session);

    let app = build_router(AppState {
        pool,
        config: ServerConfig::default(),
    });
    let response = app
        .oneshot(get(&format!("/chat/{}", dm.id), &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/home");
}

#[tokio::test]
#[ignore = "requires database"]
async fn starting_a_chat_with_yourself_is_refused() {
    let pool = pool().await;
    let me = user(&pool, "self").await;
    let cookie = login_cookie(&pool, &me).await;

    let response = router(&pool)
        .oneshot(form("/start_dm", format!("username={}", me.username), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/home");
    assert_eq!(flash_texts(&response), ["You cannot start a chat with yourself."]);
    assert!(ChatRepo::new(&pool).list_for_user(me.id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires database"]
async fn unknown_dm_target_is_reported() {
    let pool = pool().await;
    let me = user(&pool, "lonely").await;
    let cookie = login_cookie(&pool, &me).await;
    let app = router(&pool);

    let response = app
        .clone()
        .oneshot(form("/start_dm", format!("username={}", unique("nobody")), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(flash_texts(&response), ["User not found."]);

    let response = app
        .oneshot(form("/start_dm", "username=+".into(), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(flash_texts(&response), ["No username provided."]);
}

#[tokio::test]
#[ignore = "requires database"]
async fn outsiders_cannot_post_to_a_chat() {
    let pool = pool().await;
    let a = user(&pool, "post-a").await;
    let b = user(&pool, "post-b").await;
    let outsider = user(&pool, "post-out").await;
    let dm = ChatRepo::new(&pool).find_or_create_dm(a.id, b.id).await.unwrap();
    let cookie = login_cookie(&pool, &outsider).await;

    let response = router(&pool)
        .oneshot(form(&format!("/chat/{}", dm.id), "body=let+me+in".into(), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/home");
    assert_eq!(flash_texts(&response), ["Chat not found."]);
    assert!(MessageRepo::new(&pool).list_for_chat(dm.id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires database"]
async fn blank_messages_are_refused() {
    let pool = pool().await;
    let a = user(&pool, "blank-a").await;
    let b = user(&pool, "blank-b").await;
    let dm = ChatRepo::new(&pool).find_or_create_dm(a.id, b.id).await.unwrap();
    let cookie = login_cookie(&pool, &a).await;
    let chat_url = format!("/chat/{}", dm.id);

    let response = router(&pool)
        .oneshot(form(&chat_url, "body=+++".into(), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], chat_url.as_str());
    assert_eq!(flash_texts(&response), ["Message cannot be empty."]);
    assert!(MessageRepo::new(&pool).list_for_chat(dm.id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires database"]
async fn home_shows_an_error_when_chats_cannot_load() {
    // Private schema so the broken table does not affect other tests.
    let shared = pool().await;
    let schema = format!("t_{}", Uuid::new_v4().simple());
    sqlx::query(&format!("CREATE SCHEMA {}", schema))
        .execute(&shared)
        .await
        .unwrap();

    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let options = url
        .parse::<PgConnectOptions>()
        .unwrap()
        .options([("search_path", schema.as_str())]);
    let pool = create_pool_with_connect_options(options, 2).await.unwrap();
    migrations::run(&pool).await.unwrap();

    let me = user(&pool, "broken").await;
    let cookie = login_cookie(&pool, &me).await;
    sqlx::query("DROP TABLE chat_members CASCADE")
        .execute(&pool)
        .await
        .unwrap();

    let response = router(&pool).oneshot(get("/home", &cookie)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = text(response).await;
    assert!(html.contains(r#"<div class="flash error" role="status">Error loading chats.</div>"#));
    assert!(html.contains(&format!("Hello, {}", me.username)));

    pool.close().await;
    sqlx::query(&format!("DROP SCHEMA {} CASCADE", schema))
        .execute(&shared)
        .await
        .unwrap();
}
