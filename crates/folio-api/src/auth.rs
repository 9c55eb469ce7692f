use axum::{Extension, Json, extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;
use tracing::{info, warn};
use uuid::Uuid;

use folio_types::api::{
    LoginRequest, MessageResponse, RegisterRequest, RegisterResponse, TokenResponse, UserResponse,
};
use folio_types::models::TokenKind;

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::session::{self, Principal, TokenCarrier};
use crate::tokens::TokenPair;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.password != req.password_repeat {
        return Err(ApiError::Validation("passwords do not match".into()));
    }

    // Validate input; lengths are in characters, not bytes
    let login = normalize_login(&req.login);
    let email = req.email.trim();
    let login_chars = login.chars().count();
    if !(3..=32).contains(&login_chars) {
        return Err(ApiError::Validation("login must be 3 to 32 characters".into()));
    }
    if !email.contains('@') {
        return Err(ApiError::Validation("email address is not valid".into()));
    }
    if req.password.chars().count() < 8 {
        return Err(ApiError::Validation("password must be at least 8 characters".into()));
    }

    // Check if login or email is taken
    if state.db.get_user_by_login(login)?.is_some() {
        return Err(ApiError::Conflict("login already registered".into()));
    }
    if state.db.get_user_by_email(email)?.is_some() {
        return Err(ApiError::Conflict("email already registered".into()));
    }

    let password_hash = state.passwords.hash(&req.password)?;

    let user = state
        .db
        .create_user(Uuid::new_v4(), login, email, &password_hash)
        .map_err(|e| {
            // Lost a race with a concurrent registration.
            if folio_db::is_constraint_violation(&e) {
                ApiError::Conflict("login or email already registered".into())
            } else {
                ApiError::Internal(e)
            }
        })?;

    info!(user_id = %user.id, login = %user.login, "Registered user");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user.id,
            login: user.login,
            email: user.email,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<TokenResponse>)> {
    let login = normalize_login(&req.login);
    let user = state.db.get_user_by_login(login)?;

    // Same error for unknown login and wrong password.
    let user = match user {
        Some(user) if state.passwords.verify(&req.password, &user.password) => user,
        _ => {
            warn!(%login, "Failed login attempt");
            return Err(ApiError::Authentication("invalid credentials".into()));
        }
    };

    let pair = state.tokens.issue_pair(user.id)?;
    info!(user_id = %user.id, "User logged in");

    Ok(issue_session(&state, jar, pair))
}

/// Trades a valid refresh token for a fresh token pair. The old refresh
/// token stays valid until it expires.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<TokenResponse>)> {
    let raw = session::extract_token(state.carrier, &headers, TokenKind::Refresh)?;
    let user_id = state
        .tokens
        .verify_refresh(&raw)
        .ok_or_else(|| ApiError::Authentication("invalid or expired token".into()))?;

    // The account may have been removed since the token was issued.
    if state.db.get_user_by_id(user_id)?.is_none() {
        return Err(ApiError::Authentication("invalid or expired token".into()));
    }

    let pair = state.tokens.issue_pair(user_id)?;
    Ok(issue_session(&state, jar, pair))
}

/// Clears both auth cookies unconditionally.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    (
        session::clear_cookies(jar, state.cookie_secure),
        Json(MessageResponse {
            message: "logged out".into(),
        }),
    )
}

pub async fn me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<UserResponse>> {
    let user = state
        .db
        .get_user_by_id(principal.user_id())?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    Ok(Json(UserResponse {
        id: user.id,
        login: user.login,
        email: user.email,
        created_at: user.created_at,
    }))
}

/// Logins are stored and looked up without surrounding whitespace.
fn normalize_login(raw: &str) -> &str {
    raw.trim()
}

fn issue_session(state: &AppState, jar: CookieJar, pair: TokenPair) -> (CookieJar, Json<TokenResponse>) {
    let access_ttl = state.tokens.access_ttl().num_seconds();

    let jar = match state.carrier {
        TokenCarrier::Cookie => jar
            .add(session::access_cookie(&pair.access_token, access_ttl, state.cookie_secure))
            .add(session::refresh_cookie(
                &pair.refresh_token,
                state.tokens.refresh_ttl().num_seconds(),
                state.cookie_secure,
            )),
        TokenCarrier::Bearer => jar,
    };

    (
        jar,
        Json(TokenResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "bearer".to_string(),
            expires_in: access_ttl,
        }),
    )
}
