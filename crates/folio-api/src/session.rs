//! Session boundary: pulls a raw token off the request and turns it into
//! an authenticated [`Principal`].
//!
//! A deployment picks one [`TokenCarrier`]. Cookie mode reads the
//! `access_token` / `refresh_token` cookies; bearer mode reads
//! `Authorization: Bearer <token>`. There is no fallback between them.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::debug;
use uuid::Uuid;

use folio_types::models::TokenKind;

use crate::AppState;
use crate::error::ApiError;
use crate::tokens::TokenService;

/// Cookie name for the access token.
pub const ACCESS_COOKIE: &str = "access_token";
/// Cookie name for the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCarrier {
    Cookie,
    Bearer,
}

impl TokenCarrier {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cookie" | "cookies" => Some(TokenCarrier::Cookie),
            "bearer" | "header" => Some(TokenCarrier::Bearer),
            _ => None,
        }
    }
}

/// The user a verified access token speaks for. Stored in request
/// extensions by [`require_auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal(pub Uuid);

impl Principal {
    pub fn user_id(&self) -> Uuid {
        self.0
    }
}

fn cookie_name(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Access => ACCESS_COOKIE,
        TokenKind::Refresh => REFRESH_COOKIE,
    }
}

/// Reads the raw token of the given kind from the deployment's carrier.
pub fn extract_token(carrier: TokenCarrier, headers: &HeaderMap, kind: TokenKind) -> Result<String, ApiError> {
    match carrier {
        TokenCarrier::Cookie => CookieJar::from_headers(headers)
            .get(cookie_name(kind))
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::Authentication("missing credential".into())),
        TokenCarrier::Bearer => bearer_token(headers),
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::Authentication("missing credential".into()))?
        .to_str()
        .map_err(|_| ApiError::Authentication("invalid authorization header".into()))?;

    // Scheme names are case-insensitive.
    let (scheme, token) = header.trim().split_once(' ').unwrap_or((header.trim(), ""));
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiError::Authentication("invalid authorization scheme".into()));
    }
    let token = token.trim();

    if token.is_empty() {
        return Err(ApiError::Authentication("missing credential".into()));
    }
    Ok(token.to_string())
}

/// Verifies a raw access token and yields its principal.
pub fn resolve_principal(tokens: &TokenService, raw: &str) -> Result<Principal, ApiError> {
    tokens
        .verify_access(raw)
        .map(Principal)
        .ok_or_else(|| ApiError::Authentication("invalid or expired token".into()))
}

/// Axum middleware: extracts the access token from the configured carrier,
/// verifies it, and injects [`Principal`] into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let raw = extract_token(state.carrier, request.headers(), TokenKind::Access)?;
    let principal = resolve_principal(&state.tokens, &raw)?;
    debug!(user_id = %principal.user_id(), "Authenticated request");

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

// -- Cookies --

fn auth_cookie(name: &'static str, value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

/// httpOnly cookie carrying the access token; Max-Age matches the token lifetime.
pub fn access_cookie(token: &str, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    auth_cookie(ACCESS_COOKIE, token.to_string(), max_age_secs, secure)
}

/// httpOnly cookie carrying the refresh token; Max-Age matches the token lifetime.
pub fn refresh_cookie(token: &str, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    auth_cookie(REFRESH_COOKIE, token.to_string(), max_age_secs, secure)
}

/// Adds expired cookies for both names, whether or not the client sent them.
pub fn clear_cookies(jar: CookieJar, secure: bool) -> CookieJar {
    jar.add(auth_cookie(ACCESS_COOKIE, String::new(), 0, secure))
        .add(auth_cookie(REFRESH_COOKIE, String::new(), 0, secure))
}
