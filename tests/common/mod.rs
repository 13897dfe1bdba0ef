// SPDX-License-Identifier: MIT

//! Shared test harness.
//!
//! Spins up an in-process fake of the Google endpoints the backend talks
//! to (token, userinfo, Drive search, Sheets values/batchUpdate) backed by
//! an in-memory grid, and builds the app router against it.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use sheetcrm::config::Config;
use sheetcrm::models::{EntityKind, Session};
use sheetcrm::routes::create_router;
use sheetcrm::services::codec;
use sheetcrm::time_utils::now_epoch_ms;
use sheetcrm::AppState;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[allow(dead_code)]
pub const FAKE_SPREADSHEET_ID: &str = "fake-spreadsheet";

/// Sheet tab name -> raw value grid (row 0 is the header).
pub type Grid = Arc<Mutex<BTreeMap<String, Vec<Vec<String>>>>>;

/// Seed a grid with header rows for every entity sheet.
#[allow(dead_code)]
pub fn seeded_grid() -> Grid {
    let mut sheets = BTreeMap::new();
    for kind in EntityKind::ALL {
        let headers: Vec<String> = kind.headers().iter().map(|h| h.to_string()).collect();
        sheets.insert(kind.sheet_name().to_string(), vec![headers]);
    }
    Arc::new(Mutex::new(sheets))
}

/// A grid with entity tabs present but completely empty (no headers yet).
#[allow(dead_code)]
pub fn empty_grid() -> Grid {
    let mut sheets = BTreeMap::new();
    for kind in EntityKind::ALL {
        sheets.insert(kind.sheet_name().to_string(), vec![]);
    }
    Arc::new(Mutex::new(sheets))
}

/// Start the fake Google server on an ephemeral port.
///
/// Returns its base URL; route the app at it via [`test_config`].
#[allow(dead_code)]
pub async fn spawn_fake_google(grid: Grid) -> String {
    let router = Router::new()
        .route("/token", post(token))
        .route("/userinfo", get(userinfo))
        .route("/drive/files", get(drive_files))
        .route("/sheets/{ssid}", get(sheet_metadata).post(batch_update))
        .route(
            "/sheets/{ssid}/values/{range}",
            get(values_get).post(values_append).put(values_put),
        )
        .with_state(grid);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("fake server");
    });

    format!("http://{addr}")
}

/// Test config pointing every Google endpoint at the fake server.
#[allow(dead_code)]
pub fn test_config(fake_base: &str) -> Config {
    let mut config = Config::test_default();
    config.google_token_url = format!("{fake_base}/token");
    config.google_userinfo_url = format!("{fake_base}/userinfo");
    config.drive_api_base = format!("{fake_base}/drive");
    config.sheets_api_base = format!("{fake_base}/sheets");
    config
}

/// Build the full app router from a config.
#[allow(dead_code)]
pub fn create_test_app(config: Config) -> axum::Router {
    let state = Arc::new(AppState::new(config));
    create_router(state)
}

/// Fake server plus app wired to it, with entity sheets already initialized.
#[allow(dead_code)]
pub async fn create_app_with_sheets() -> (axum::Router, Config, Grid) {
    let grid = seeded_grid();
    let base = spawn_fake_google(grid.clone()).await;
    let config = test_config(&base);
    let app = create_test_app(config.clone());
    (app, config, grid)
}

/// Encrypted session cookie header value for a logged-in test user.
#[allow(dead_code)]
pub fn session_cookie(config: &Config) -> String {
    let session = Session {
        access_token: "test-access-token".to_string(),
        refresh_token: "test-refresh-token".to_string(),
        expires_at: now_epoch_ms() + 3_600_000,
        email: "ann@example.com".to_string(),
        name: "Ann Example".to_string(),
        picture: String::new(),
        spreadsheet_id: FAKE_SPREADSHEET_ID.to_string(),
    };
    let value = codec::encrypt_session(&session, &config.cookie_secret).expect("encrypt session");
    format!("{}={}", codec::SESSION_COOKIE, value)
}

/// Session cookie whose access token is already past its expiry, forcing
/// the middleware down the refresh path.
#[allow(dead_code)]
pub fn expired_session_cookie(config: &Config) -> String {
    let session = Session {
        access_token: "stale-access-token".to_string(),
        refresh_token: "test-refresh-token".to_string(),
        expires_at: now_epoch_ms() - 1000,
        email: "ann@example.com".to_string(),
        name: "Ann Example".to_string(),
        picture: String::new(),
        spreadsheet_id: FAKE_SPREADSHEET_ID.to_string(),
    };
    let value = codec::encrypt_session(&session, &config.cookie_secret).expect("encrypt session");
    format!("{}={}", codec::SESSION_COOKIE, value)
}

/// Collect a response body as JSON.
#[allow(dead_code)]
pub async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

// ─── Fake endpoint handlers ──────────────────────────────────

async fn token() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "access_token": "refreshed-access-token",
        "refresh_token": "refreshed-refresh-token",
        "expires_in": 3600,
        "token_type": "Bearer",
    }))
}

async fn userinfo() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "email": "ann@example.com",
        "name": "Ann Example",
        "picture": "https://example.com/ann.png",
    }))
}

async fn drive_files() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "files": [{"id": FAKE_SPREADSHEET_ID, "name": "SheetCRM Data"}],
    }))
}

async fn sheet_metadata(State(grid): State<Grid>, Path(_ssid): Path<String>) -> Json<serde_json::Value> {
    let sheets = grid.lock().unwrap();
    let entries: Vec<serde_json::Value> = sheets
        .keys()
        .enumerate()
        .map(|(index, title)| {
            serde_json::json!({"properties": {"sheetId": index, "title": title}})
        })
        .collect();
    Json(serde_json::json!({"sheets": entries}))
}

/// `POST {ssid}:batchUpdate` lands here; only deleteDimension is emulated.
async fn batch_update(
    State(grid): State<Grid>,
    Path(_ssid): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let mut sheets = grid.lock().unwrap();
    if let Some(range) = body
        .pointer("/requests/0/deleteDimension/range")
        .and_then(|r| r.as_object())
    {
        let sheet_index = range["sheetId"].as_u64().unwrap() as usize;
        let start = range["startIndex"].as_u64().unwrap() as usize;
        let title = sheets.keys().nth(sheet_index).cloned().expect("known sheetId");
        let rows = sheets.get_mut(&title).unwrap();
        if start < rows.len() {
            rows.remove(start);
        }
    }
    Json(serde_json::json!({"replies": []}))
}

/// Split `sheet!spec` (or bare `sheet`) into its parts.
fn split_range(range: &str) -> (String, Option<String>) {
    match range.split_once('!') {
        Some((sheet, spec)) => (sheet.to_string(), Some(spec.to_string())),
        None => (range.to_string(), None),
    }
}

async fn values_get(
    State(grid): State<Grid>,
    Path((_ssid, range)): Path<(String, String)>,
) -> Json<serde_json::Value> {
    let (sheet, spec) = split_range(&range);
    let sheets = grid.lock().unwrap();
    let rows = sheets.get(&sheet).cloned().unwrap_or_default();

    let values: Vec<Vec<String>> = match spec.as_deref() {
        Some("1:1") => rows.into_iter().take(1).collect(),
        _ => rows,
    };
    Json(serde_json::json!({"values": values}))
}

/// `POST values/{sheet}:append` lands here with the suffix in the capture.
async fn values_append(
    State(grid): State<Grid>,
    Path((_ssid, range)): Path<(String, String)>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let sheet = range.trim_end_matches(":append").to_string();
    let mut sheets = grid.lock().unwrap();
    let rows = sheets.entry(sheet).or_default();
    for row in body["values"].as_array().unwrap() {
        rows.push(json_row(row));
    }
    Json(serde_json::json!({"updates": {}}))
}

async fn values_put(
    State(grid): State<Grid>,
    Path((_ssid, range)): Path<(String, String)>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let (sheet, spec) = split_range(&range);
    // Row number from the first cell reference, e.g. "A3:I3" -> 3
    let row_number: usize = spec
        .as_deref()
        .unwrap_or("A1")
        .split(':')
        .next()
        .unwrap()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .expect("row number in range");

    let mut sheets = grid.lock().unwrap();
    let rows = sheets.entry(sheet).or_default();
    if rows.len() < row_number {
        rows.resize(row_number, vec![]);
    }
    rows[row_number - 1] = json_row(&body["values"][0]);
    Json(serde_json::json!({"updatedCells": 1}))
}

fn json_row(row: &serde_json::Value) -> Vec<String> {
    row.as_array()
        .unwrap()
        .iter()
        .map(|cell| cell.as_str().unwrap_or_default().to_string())
        .collect()
}
