use chrono::{DateTime, Utc};

use super::{escape, layout};
use crate::auth::Flash;
use crate::db::repos::{ChatMessage, ChatSummary};

fn timestamp(at: &DateTime<Utc>) -> String {
    format!(
        r#"<time datetime="{}">{}</time>"#,
        at.to_rfc3339(),
        at.format("%Y-%m-%d %H:%M")
    )
}

pub fn register_page(flashes: &[Flash]) -> String {
    let body = r#"<h1>Register</h1>
<form method="post" action="/register">
<p><label>Username <input name="username" autocomplete="username" required></label></p>
<p><label>Password <input name="password" type="password" autocomplete="new-password" required></label></p>
<p><button type="submit">Register</button></p>
</form>
<p>Already registered? <a href="/login">Log in</a></p>"#;

    layout("Register", false, flashes, body)
}

pub fn login_page(flashes: &[Flash]) -> String {
    let body = r#"<h1>Log in</h1>
<form method="post" action="/login">
<p><label>Username <input name="username" autocomplete="username" required></label></p>
<p><label>Password <input name="password" type="password" autocomplete="current-password" required></label></p>
<p><button type="submit">Log in</button></p>
</form>
<p>No account yet? <a href="/register">Register</a></p>"#;

    layout("Log in", false, flashes, body)
}

/// Suggests usernames from `/search_users` as the user types.
const SEARCH_SCRIPT: &str = r#"<script>
(function () {
  var input = document.getElementById("dm-username");
  var list = document.getElementById("user-suggestions");
  var pending;
  input.addEventListener("input", function () {
    clearTimeout(pending);
    var q = input.value.trim();
    if (!q) { list.innerHTML = ""; return; }
    pending = setTimeout(function () {
      fetch("/search_users?q=" + encodeURIComponent(q), { credentials: "same-origin" })
        .then(function (r) { return r.ok ? r.json() : []; })
        .then(function (users) {
          list.innerHTML = "";
          users.forEach(function (u) {
            var opt = document.createElement("option");
            opt.value = u.username;
            list.appendChild(opt);
          });
        });
    }, 200);
  });
})();
</script>"#;

pub fn home_page(username: &str, chats: &[ChatSummary], flashes: &[Flash]) -> String {
    let mut body = format!("<h1>Hello, {}</h1>\n", escape(username));

    body.push_str(
        r#"<h2>Start a chat</h2>
<form class="inline" method="post" action="/start_dm">
<input id="dm-username" name="username" list="user-suggestions" placeholder="Search users" autocomplete="off" required>
<datalist id="user-suggestions"></datalist>
<button type="submit">Chat</button>
</form>
"#,
    );

    body.push_str("<h2>Your chats</h2>\n");
    if chats.is_empty() {
        body.push_str("<p>No chats yet.</p>\n");
    } else {
        body.push_str("<ul class=\"chats\">\n");
        for chat in chats {
            body.push_str(&format!(
                "<li><a href=\"/chat/{}\">{}</a>{}</li>\n",
                chat.id,
                escape(&chat.other_username),
                timestamp(&chat.last_activity)
            ));
        }
        body.push_str("</ul>\n");
    }

    body.push_str(SEARCH_SCRIPT);
    layout("Home", true, flashes, &body)
}

pub fn chat_page(
    chat_id: i64,
    chat_title: &str,
    messages: &[ChatMessage],
    flashes: &[Flash],
) -> String {
    let mut body = format!("<h1>{}</h1>\n", escape(chat_title));

    if messages.is_empty() {
        body.push_str("<p>No messages yet. Say hello!</p>\n");
    } else {
        body.push_str("<ol class=\"messages\">\n");
        for m in messages {
            body.push_str(&format!(
                "<li id=\"m{}\"><strong>{}</strong>{}<div class=\"body\">{}</div></li>\n",
                m.id,
                escape(&m.author),
                timestamp(&m.created_at),
                escape(&m.body)
            ));
        }
        body.push_str("</ol>\n");
    }

    body.push_str(&format!(
        r#"<form class="inline" method="post" action="/chat/{}">
<textarea name="body" rows="2" cols="50" required></textarea>
<button type="submit">Send</button>
</form>
"#,
        chat_id
    ));

    layout(chat_title, true, flashes, &body)
}

pub fn not_found_page() -> String {
    layout(
        "Not found",
        false,
        &[],
        "<h1>Not found</h1>\n<p>That page does not exist. <a href=\"/home\">Back to your chats</a></p>\n",
    )
}
