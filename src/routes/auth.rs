// SPDX-License-Identifier: MIT

//! Google OAuth authentication routes.
//!
//! Login sets a short-lived random state cookie and redirects to the
//! consent screen; the callback validates that state against the query
//! parameter before any token exchange happens.

use crate::error::{AppError, Result};
use crate::models::Session;
use crate::services::codec;
use crate::time_utils::now_epoch_ms;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Routes that must work without a session.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", get(login))
        .route("/auth/callback", get(callback))
        .route("/auth/logout", post(logout))
}

/// Routes gated by the session middleware (applied in routes/mod.rs).
pub fn session_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/status", get(status))
        .route("/auth/me", get(me))
}

/// Compute the OAuth callback URL from the request's Host header.
fn callback_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost:8080");

    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };

    format!("{scheme}://{host}/api/v1/auth/callback")
}

/// Start the OAuth flow: set the state cookie and redirect to consent.
async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    let oauth_state = codec::generate_state()?;
    let auth_url = state
        .google
        .authorization_url(&callback_url(&headers), &oauth_state);

    tracing::info!("Starting OAuth flow, redirecting to Google");

    let jar = jar.add(codec::state_cookie(oauth_state));
    Ok((jar, Redirect::temporary(&auth_url)))
}

#[derive(Deserialize)]
struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback: validate state, exchange code, provision the data
/// spreadsheet, and set the session cookie.
async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    let frontend = state.config.frontend_url.trim_end_matches('/');

    // Capture the single-use state cookie, then drop it on the way out.
    let cookie_state = jar.get(codec::STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(codec::removal_cookie(codec::STATE_COOKIE));

    // Provider-reported error (user denied consent, etc.)
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Google");
        let redirect = format!("{frontend}/login?error={}", urlencoding::encode(&error));
        return Ok((jar, Redirect::temporary(&redirect)).into_response());
    }

    // State must equal the cookie set at login. Missing or mismatched
    // state is rejected outright, regardless of a valid code.
    let query_state = params.state.unwrap_or_default();
    let matches = cookie_state
        .as_deref()
        .map(|cookie| state_matches(cookie, &query_state))
        .unwrap_or(false);

    if !matches {
        tracing::warn!("OAuth state mismatch, rejecting callback");
        // The jar still carries the state removal; the 403 must drop the
        // single-use cookie like every other callback outcome.
        return Ok((jar, AppError::ForbiddenOrigin.into_response()).into_response());
    }

    let Some(code) = params.code else {
        let redirect = format!("{frontend}/login?error=missing_code");
        return Ok((jar, Redirect::temporary(&redirect)).into_response());
    };

    // Exchange the code and build the session. Any upstream failure
    // redirects back to the login page with an error code.
    let session = match establish_session(&state, &code, &callback_url(&headers)).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "OAuth callback failed");
            let code = match e {
                AppError::AuthExchange(_) => "token_exchange_failed",
                AppError::UserInfo(_) => "userinfo_failed",
                AppError::SheetsApi(_) => "spreadsheet_failed",
                _ => "auth_failed",
            };
            let redirect = format!("{frontend}/login?error={code}");
            return Ok((jar, Redirect::temporary(&redirect)).into_response());
        }
    };

    tracing::info!(email = %session.email, "OAuth successful, session established");

    let value = codec::encrypt_session(&session, &state.config.cookie_secret)?;
    let jar = jar.add(codec::session_cookie(value));

    Ok((jar, Redirect::temporary(frontend)).into_response())
}

/// Exchange the code, fetch the profile, and resolve the data spreadsheet.
async fn establish_session(
    state: &AppState,
    code: &str,
    redirect_uri: &str,
) -> Result<Session> {
    let tokens = state.google.exchange_code(code, redirect_uri).await?;
    let user = state.google.fetch_user_info(&tokens.access_token).await?;
    let spreadsheet_id = state
        .google
        .find_or_create_spreadsheet(&tokens.access_token)
        .await?;

    Ok(Session {
        expires_at: now_epoch_ms() + tokens.expires_in * 1000,
        refresh_token: tokens.refresh_token.unwrap_or_default(),
        access_token: tokens.access_token,
        email: user.email,
        name: user.name,
        picture: user.picture,
        spreadsheet_id,
    })
}

/// Constant-time equality for the OAuth state token.
fn state_matches(cookie: &str, query: &str) -> bool {
    cookie.len() == query.len() && bool::from(cookie.as_bytes().ct_eq(query.as_bytes()))
}

fn user_json(session: &Session) -> serde_json::Value {
    serde_json::json!({
        "email": session.email,
        "name": session.name,
        "picture": session.picture,
        "spreadsheetId": session.spreadsheet_id,
    })
}

/// Session status for the frontend. 401s are produced by the middleware.
async fn status(Extension(session): Extension<Session>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "authenticated": true,
        "user": user_json(&session),
    }))
}

/// Current user profile.
async fn me(Extension(session): Extension<Session>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "authenticated": true,
        "user": user_json(&session),
    }))
}

/// Clear the session cookie. Works with or without a valid session.
async fn logout(jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    let jar = jar.remove(codec::removal_cookie(codec::SESSION_COOKIE));
    (jar, Json(serde_json::json!({"success": true})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_matches() {
        assert!(state_matches("abc123", "abc123"));
        assert!(!state_matches("abc123", "abc124"));
        assert!(!state_matches("abc123", "abc12"));
        assert!(!state_matches("", "abc123"));
    }

    #[test]
    fn test_callback_url_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::HOST, "localhost:8080".parse().unwrap());
        assert_eq!(
            callback_url(&headers),
            "http://localhost:8080/api/v1/auth/callback"
        );

        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::HOST, "crm.example.com".parse().unwrap());
        assert_eq!(
            callback_url(&headers),
            "https://crm.example.com/api/v1/auth/callback"
        );
    }

}
