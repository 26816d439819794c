//! Server-rendered HTML pages
//!
//! Pages are plain strings built around a shared layout. Every piece of
//! user-supplied text goes through [`escape`].

mod pages;

pub use pages::{chat_page, home_page, login_page, not_found_page, register_page};

use crate::auth::Flash;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 42rem; margin: 2rem auto; padding: 0 1rem; }
nav a { margin-right: 1rem; }
.flash { padding: .5rem .75rem; margin: .5rem 0; border-radius: 4px; }
.flash.success { background: #e6f4ea; }
.flash.error { background: #fce8e6; }
.flash.info { background: #e8f0fe; }
.chats li, .messages li { margin: .35rem 0; }
.messages time { color: #666; font-size: .8em; margin-left: .5rem; }
.messages .body { white-space: pre-wrap; }
form.inline { display: flex; gap: .5rem; }
"#;

/// Escape text for use in HTML element content and quoted attributes.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn flash_list(flashes: &[Flash]) -> String {
    flashes
        .iter()
        .map(|f| {
            format!(
                r#"<div class="flash {}" role="status">{}</div>"#,
                f.level.as_str(),
                escape(&f.text)
            )
        })
        .collect()
}

/// Wrap `body` in the page skeleton. `title` is escaped here; `body` must
/// already be safe HTML.
fn layout(title: &str, logged_in: bool, flashes: &[Flash], body: &str) -> String {
    let nav = if logged_in {
        r#"<a href="/home">Home</a><a href="/logout">Log out</a>"#
    } else {
        r#"<a href="/register">Register</a><a href="/login">Log in</a>"#
    };

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} · dmchat</title>
<style>{style}</style>
</head>
<body>
<nav>{nav}</nav>
{flashes}
{body}
</body>
</html>
"#,
        title = escape(title),
        style = STYLE,
        nav = nav,
        flashes = flash_list(flashes),
        body = body,
    )
}
