//! Session cookie handling for the `auth_token` cookie.

use axum::http::{
    header::{InvalidHeaderValue, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use axum_extra::extract::cookie::CookieJar;

use crate::auth::jwt::TOKEN_TTL_DAYS;

pub const AUTH_COOKIE_NAME: &str = "auth_token";

/// Cookie max-age in seconds; matches the token lifetime.
pub const AUTH_COOKIE_MAX_AGE: i64 = TOKEN_TTL_DAYS * 24 * 60 * 60;

/// Binds session tokens to the `auth_token` cookie.
#[derive(Debug, Clone, Default)]
pub struct SessionCookies {
    domain: Option<String>,
}

impl SessionCookies {
    pub fn new(domain: Option<String>) -> Self {
        let domain = domain
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        Self { domain }
    }

    /// Attach the token as an HttpOnly, Secure, SameSite=Strict cookie.
    pub fn set(&self, headers: &mut HeaderMap, token: &str) -> Result<(), InvalidHeaderValue> {
        let value = self.render(token, AUTH_COOKIE_MAX_AGE)?;
        headers.append(SET_COOKIE, value);
        Ok(())
    }

    /// Remove the cookie from the browser.
    pub fn clear(&self, headers: &mut HeaderMap) -> Result<(), InvalidHeaderValue> {
        let value = self.render("", 0)?;
        headers.append(SET_COOKIE, value);
        Ok(())
    }

    /// Read the session token from the request's `Cookie` header.
    pub fn read(headers: &HeaderMap) -> Option<String> {
        let jar = CookieJar::from_headers(headers);
        jar.get(AUTH_COOKIE_NAME)
            .map(|cookie| cookie.value().trim().to_string())
            .filter(|token| !token.is_empty())
    }

    fn render(&self, token: &str, max_age: i64) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!(
            "{AUTH_COOKIE_NAME}={token}; Path=/; Max-Age={max_age}; HttpOnly; Secure; SameSite=Strict"
        );
        if let Some(domain) = &self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        HeaderValue::from_str(&cookie)
    }
}
