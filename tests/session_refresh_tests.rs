// SPDX-License-Identifier: MIT

//! Session cookie refresh behavior.
//!
//! An expired (or nearly expired) access token is refreshed transparently
//! inside the middleware; a failed refresh invalidates the session with no
//! retry.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use sheetcrm::services::codec;
use tower::ServiceExt;

mod common;

#[tokio::test]
async fn test_expired_token_is_refreshed_transparently() {
    let (app, config, _grid) = common::create_app_with_sheets().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/me")
                .header(header::COOKIE, common::expired_session_cookie(&config))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // The request succeeds on the refreshed token
    assert_eq!(response.status(), StatusCode::OK);

    // And the re-issued cookie carries the refreshed session
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    let value = set_cookie
        .strip_prefix("sheetcrm_session=")
        .unwrap()
        .split(';')
        .next()
        .unwrap();
    let session = codec::decrypt_session(value, &config.cookie_secret).expect("decryptable");
    assert_eq!(session.access_token, "refreshed-access-token");
    assert_eq!(session.refresh_token, "refreshed-refresh-token");
    assert!(session.expires_at > sheetcrm::time_utils::now_epoch_ms());
}

#[tokio::test]
async fn test_failed_refresh_returns_unauthorized() {
    let grid = common::seeded_grid();
    let base = common::spawn_fake_google(grid).await;
    let mut config = common::test_config(&base);
    config.google_token_url = format!("{base}/token-broken");
    let app = common::create_test_app(config.clone());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/me")
                .header(header::COOKIE, common::expired_session_cookie(&config))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = common::response_json(response).await;
    assert_eq!(body["error"], "Unauthorized. Please sign in.");
}

#[tokio::test]
async fn test_fresh_token_skips_refresh_but_still_reissues_cookie() {
    // Point the token endpoint at a broken path; a fresh session must never
    // call it.
    let grid = common::seeded_grid();
    let base = common::spawn_fake_google(grid).await;
    let mut config = common::test_config(&base);
    config.google_token_url = format!("{base}/token-broken");
    let app = common::create_test_app(config.clone());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/me")
                .header(header::COOKIE, common::session_cookie(&config))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    let value = set_cookie
        .strip_prefix("sheetcrm_session=")
        .unwrap()
        .split(';')
        .next()
        .unwrap();
    let session = codec::decrypt_session(value, &config.cookie_secret).expect("decryptable");
    assert_eq!(session.access_token, "test-access-token");
}
