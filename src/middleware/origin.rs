// SPDX-License-Identifier: MIT

//! Same-origin check for state-changing requests.
//!
//! POST/PUT/DELETE must carry an Origin (or Referer) matching the
//! configured frontend or a localhost dev origin. This runs before routing
//! and fails with 403 independent of auth status.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

pub async fn enforce_same_origin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if matches!(*request.method(), Method::POST | Method::PUT | Method::DELETE) {
        let headers = request.headers();

        let origin = headers
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| {
                headers
                    .get(header::REFERER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(referer_origin)
            });

        match origin {
            Some(origin) if origin_allowed(&origin, &state.config.frontend_url) => {}
            other => {
                tracing::warn!(
                    origin = ?other,
                    method = %request.method(),
                    path = %request.uri().path(),
                    "Rejecting cross-origin state-changing request"
                );
                return Err(AppError::ForbiddenOrigin);
            }
        }
    }

    Ok(next.run(request).await)
}

/// Extract `scheme://host[:port]` from a Referer URL.
fn referer_origin(referer: &str) -> Option<String> {
    let scheme_end = referer.find("://")?;
    let rest = &referer[scheme_end + 3..];
    let host_end = rest.find('/').unwrap_or(rest.len());
    Some(format!("{}{}", &referer[..scheme_end + 3], &rest[..host_end]))
}

fn origin_allowed(origin: &str, frontend_url: &str) -> bool {
    origin == frontend_url.trim_end_matches('/') || is_localhost_origin(origin)
}

/// Exact-host dev allowance. A prefix check would also admit hosts like
/// `localhost.evil.com`, so the host must end at the port or the string.
fn is_localhost_origin(origin: &str) -> bool {
    ["http://localhost", "http://127.0.0.1"].iter().any(|base| {
        origin
            .strip_prefix(base)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(':'))
    })
}
