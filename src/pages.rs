//! Server-rendered page shells.
//!
//! Deliberately small: the pages exist so the route gate has something to
//! guard. Forms post JSON to the auth API from a short inline script.

use axum::{
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Extension, Json, Router,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::models::Claims;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login_page))
        .route("/register", get(register_page))
        .route("/dashboard", get(dashboard))
        .route("/profile", get(profile))
}

/// Health check - GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn home() -> Html<String> {
    layout(
        "STRM",
        r#"<h1>STRM</h1>
<p><a href="/login">Sign in</a> or <a href="/register">create an account</a>.</p>
<p><a href="/dashboard">Dashboard</a></p>"#,
    )
}

async fn login_page() -> Html<String> {
    layout(
        "Sign in",
        r#"<h1>Sign in</h1>
<form id="auth-form" data-endpoint="/api/auth/login">
  <input name="username" placeholder="Username" autocomplete="username" required>
  <input name="password" type="password" placeholder="Password" autocomplete="current-password" required>
  <button type="submit">Sign in</button>
</form>
<p id="form-error"></p>
<p>No account? <a href="/register">Register</a></p>"#,
    )
}

async fn register_page() -> Html<String> {
    layout(
        "Register",
        r#"<h1>Create an account</h1>
<form id="auth-form" data-endpoint="/api/auth/register">
  <input name="username" placeholder="Username" autocomplete="username" required>
  <input name="email" type="email" placeholder="Email" autocomplete="email" required>
  <input name="password" type="password" placeholder="Password" autocomplete="new-password" required>
  <input name="confirmPassword" type="password" placeholder="Confirm password" autocomplete="new-password" required>
  <button type="submit">Register</button>
</form>
<p id="form-error"></p>
<p>Already registered? <a href="/login">Sign in</a></p>"#,
    )
}

async fn dashboard(claims: Option<Extension<Claims>>) -> Response {
    let Some(Extension(claims)) = claims else {
        return Redirect::temporary("/login").into_response();
    };
    layout(
        "Dashboard",
        &format!(
            r#"<h1>Welcome back, {}</h1>
<p><a href="/profile">Profile</a></p>
{}"#,
            escape_html(&claims.username),
            LOGOUT_BUTTON
        ),
    )
    .into_response()
}

async fn profile(claims: Option<Extension<Claims>>) -> Response {
    let Some(Extension(claims)) = claims else {
        return Redirect::temporary("/login").into_response();
    };
    layout(
        "Profile",
        &format!(
            r#"<h1>{}</h1>
<p>User #{}</p>
<p><a href="/dashboard">Dashboard</a></p>
{}"#,
            escape_html(&claims.username),
            claims.user_id,
            LOGOUT_BUTTON
        ),
    )
    .into_response()
}

const LOGOUT_BUTTON: &str = r#"<button onclick="fetch('/api/auth/logout',{method:'POST'}).then(()=>location.assign('/login'))">Log out</button>"#;

// Posts the form as JSON and follows `callbackUrl` (same-origin paths only).
const FORM_SCRIPT: &str = r#"<script>
const form = document.getElementById('auth-form');
if (form) {
  form.addEventListener('submit', async (event) => {
    event.preventDefault();
    const body = Object.fromEntries(new FormData(form));
    const res = await fetch(form.dataset.endpoint, {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify(body),
    });
    const data = await res.json().catch(() => ({}));
    if (!res.ok) {
      document.getElementById('form-error').textContent = data.error || 'Request failed';
      return;
    }
    if (form.dataset.endpoint.endsWith('/register')) {
      location.assign('/login');
      return;
    }
    const next = new URLSearchParams(location.search).get('callbackUrl');
    location.assign(next && next.startsWith('/') && !next.startsWith('//') ? next : '/dashboard');
  });
}
</script>"#;

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>{}</title></head>
<body>
{}
{}
</body>
</html>"#,
        escape_html(title),
        body,
        FORM_SCRIPT
    ))
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
