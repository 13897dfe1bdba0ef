// SPDX-License-Identifier: MIT

//! Session authentication middleware.
//!
//! Resolves the encrypted session cookie, transparently refreshes the
//! access token when it is within the expiry margin, and re-issues the
//! session cookie on every protected response so session freshness stays
//! monotonic.

use crate::error::AppError;
use crate::services::codec;
use crate::time_utils::now_epoch_ms;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Margin before token expiration when we proactively refresh (5 minutes).
const REFRESH_MARGIN_MS: i64 = 5 * 60 * 1000;

/// Middleware that requires a valid session cookie.
///
/// A missing or undecryptable cookie, and a failed refresh, are all the
/// same outcome: 401 before the handler runs. Handlers never see an absent
/// session on protected routes.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let cookie = jar.get(codec::SESSION_COOKIE).ok_or(AppError::Unauthorized)?;

    let mut session = codec::decrypt_session(cookie.value(), &state.config.cookie_secret)
        .ok_or(AppError::Unauthorized)?;

    // Refresh when within the margin, inclusive of already-expired. A
    // refresh failure invalidates the session; it is never retried.
    if now_epoch_ms() + REFRESH_MARGIN_MS >= session.expires_at {
        let tokens = state
            .google
            .refresh_access_token(&session.refresh_token)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, email = %session.email, "Token refresh failed, forcing re-login");
                AppError::Unauthorized
            })?;

        session.access_token = tokens.access_token;
        if let Some(refresh_token) = tokens.refresh_token {
            session.refresh_token = refresh_token;
        }
        session.expires_at = now_epoch_ms() + tokens.expires_in * 1000;
        tracing::debug!(email = %session.email, "Access token refreshed");
    }

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;

    // Re-encrypt unconditionally: every protected response carries a fresh
    // Set-Cookie, whether or not the token was actually near expiry.
    match codec::encrypt_session(&session, &state.config.cookie_secret) {
        Ok(value) => {
            let cookie = codec::session_cookie(value);
            if let Ok(header_value) = HeaderValue::from_str(&cookie.to_string()) {
                response.headers_mut().append(header::SET_COOKIE, header_value);
            }
        }
        Err(e) => {
            // The request already succeeded; losing one cookie refresh is
            // recoverable on the next request.
            tracing::error!(error = %e, "Failed to re-encrypt session cookie");
        }
    }

    Ok(response)
}
