// SPDX-License-Identifier: MIT

//! Entity CRUD routes over the user's spreadsheet.
//!
//! Every handler runs behind the session middleware, so the session
//! extension is always present and carries a valid access token. A fresh
//! `SheetsClient` is built per request; nothing is cached across requests.

use crate::error::{AppError, Result};
use crate::models::{EntityKind, Row, Session};
use crate::services::SheetsClient;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// API routes (session required; the middleware is applied in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/contacts", get(list_contacts).post(create_contact))
        .route(
            "/contacts/{id}",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
        .route(
            "/contacts/{id}/notes",
            get(list_contact_notes).post(create_contact_note),
        )
        .route("/companies", get(list_companies).post(create_company))
        .route(
            "/companies/{id}",
            get(get_company).put(update_company).delete(delete_company),
        )
        .route("/companies/{id}/contacts", get(list_company_contacts))
        .route("/reminders", get(list_reminders).post(create_reminder))
        .route(
            "/reminders/{id}",
            get(get_reminder).put(update_reminder).delete(delete_reminder),
        )
        .route("/deals", get(list_deals).post(create_deal))
        .route(
            "/deals/{id}",
            get(get_deal).put(update_deal).delete(delete_deal),
        )
        .route("/dashboard/stats", get(dashboard_stats))
        .route("/init", axum::routing::post(init_sheets))
}

/// Build a per-request Sheets client from the resolved session.
fn sheets_client(state: &AppState, session: &Session) -> SheetsClient {
    SheetsClient::new(
        state.http.clone(),
        state.config.sheets_api_base.clone(),
        session.spreadsheet_id.clone(),
        session.access_token.clone(),
    )
}

/// Serialize a row for the API, mapping sheet-encoded booleans back to JSON.
fn row_to_json(kind: EntityKind, row: &Row) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    for (key, value) in row {
        if kind == EntityKind::Reminders && key == "is_done" {
            let done = value == "TRUE" || value == "true";
            object.insert(key.clone(), serde_json::Value::Bool(done));
        } else {
            object.insert(key.clone(), serde_json::Value::String(value.clone()));
        }
    }
    serde_json::Value::Object(object)
}

fn rows_to_json(kind: EntityKind, rows: &[Row]) -> serde_json::Value {
    serde_json::Value::Array(rows.iter().map(|row| row_to_json(kind, row)).collect())
}

// ─── Generic CRUD helpers ────────────────────────────────────

async fn list_rows(
    state: &AppState,
    session: &Session,
    kind: EntityKind,
) -> Result<Json<serde_json::Value>> {
    let rows = sheets_client(state, session)
        .get_rows(kind.sheet_name())
        .await?;
    Ok(Json(rows_to_json(kind, &rows)))
}

async fn get_row(
    state: &AppState,
    session: &Session,
    kind: EntityKind,
    id: &str,
) -> Result<Json<serde_json::Value>> {
    let row = sheets_client(state, session)
        .get_row_by_id(kind.sheet_name(), id)
        .await?
        .ok_or_else(|| AppError::NotFound(kind.record_name().to_string()))?;
    Ok(Json(row_to_json(kind, &row)))
}

async fn create_row(
    state: &AppState,
    session: &Session,
    kind: EntityKind,
    payload: &serde_json::Value,
    forced: Option<(&str, &str)>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let mut data = kind.sanitize(payload, true)?;
    if let Some((field, value)) = forced {
        data.insert(field.to_string(), value.to_string());
    }

    let row = sheets_client(state, session)
        .append_row(kind.sheet_name(), data)
        .await?;
    Ok((StatusCode::CREATED, Json(row_to_json(kind, &row))))
}

async fn update_row(
    state: &AppState,
    session: &Session,
    kind: EntityKind,
    id: &str,
    payload: &serde_json::Value,
) -> Result<Json<serde_json::Value>> {
    let data = kind.sanitize(payload, false)?;
    let row = sheets_client(state, session)
        .update_row(kind.sheet_name(), id, data)
        .await?
        .ok_or_else(|| AppError::NotFound(kind.record_name().to_string()))?;
    Ok(Json(row_to_json(kind, &row)))
}

async fn delete_row(
    state: &AppState,
    session: &Session,
    kind: EntityKind,
    id: &str,
) -> Result<Json<serde_json::Value>> {
    let deleted = sheets_client(state, session)
        .delete_row(kind.sheet_name(), id)
        .await?;
    if !deleted {
        return Err(AppError::NotFound(kind.record_name().to_string()));
    }
    Ok(Json(serde_json::json!({"success": true})))
}

// ─── Contacts ────────────────────────────────────────────────

async fn list_contacts(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<serde_json::Value>> {
    list_rows(&state, &session, EntityKind::Contacts).await
}

async fn get_contact(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    get_row(&state, &session, EntityKind::Contacts, &id).await
}

async fn create_contact(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(payload): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    create_row(&state, &session, EntityKind::Contacts, &payload, None).await
}

async fn update_contact(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>> {
    update_row(&state, &session, EntityKind::Contacts, &id, &payload).await
}

async fn delete_contact(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    delete_row(&state, &session, EntityKind::Contacts, &id).await
}

/// Notes attached to one contact.
async fn list_contact_notes(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let notes = sheets_client(&state, &session)
        .get_rows(EntityKind::Notes.sheet_name())
        .await?;
    let filtered: Vec<Row> = notes
        .into_iter()
        .filter(|note| note.get("contact_id").map(String::as_str) == Some(id.as_str()))
        .collect();
    Ok(Json(rows_to_json(EntityKind::Notes, &filtered)))
}

/// Create a note under a contact; the path wins over any body contact_id.
async fn create_contact_note(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    create_row(
        &state,
        &session,
        EntityKind::Notes,
        &payload,
        Some(("contact_id", &id)),
    )
    .await
}

// ─── Companies ───────────────────────────────────────────────

async fn list_companies(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<serde_json::Value>> {
    list_rows(&state, &session, EntityKind::Companies).await
}

async fn get_company(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    get_row(&state, &session, EntityKind::Companies, &id).await
}

async fn create_company(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(payload): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    create_row(&state, &session, EntityKind::Companies, &payload, None).await
}

async fn update_company(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>> {
    update_row(&state, &session, EntityKind::Companies, &id, &payload).await
}

async fn delete_company(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    delete_row(&state, &session, EntityKind::Companies, &id).await
}

/// Filtered join: contacts belonging to one company.
async fn list_company_contacts(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let contacts = sheets_client(&state, &session)
        .get_rows(EntityKind::Contacts.sheet_name())
        .await?;
    let filtered: Vec<Row> = contacts
        .into_iter()
        .filter(|contact| contact.get("company_id").map(String::as_str) == Some(id.as_str()))
        .collect();
    Ok(Json(rows_to_json(EntityKind::Contacts, &filtered)))
}

// ─── Reminders ───────────────────────────────────────────────

#[derive(Deserialize)]
struct RemindersQuery {
    #[serde(default)]
    due_before: Option<String>,
}

/// List reminders, optionally filtered to those due on or before a date.
async fn list_reminders(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(params): Query<RemindersQuery>,
) -> Result<Json<serde_json::Value>> {
    let mut rows = sheets_client(&state, &session)
        .get_rows(EntityKind::Reminders.sheet_name())
        .await?;

    if let Some(raw) = params.due_before.as_deref() {
        let cutoff = parse_date(raw).ok_or_else(|| {
            AppError::Validation("Invalid 'due_before' parameter: expected an ISO-8601 date".to_string())
        })?;
        // Rows whose due_date fails to parse are excluded from the filter.
        rows.retain(|row| {
            row.get("due_date")
                .and_then(|d| parse_date(d))
                .map(|due| due <= cutoff)
                .unwrap_or(false)
        });
    }

    Ok(Json(rows_to_json(EntityKind::Reminders, &rows)))
}

async fn get_reminder(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    get_row(&state, &session, EntityKind::Reminders, &id).await
}

async fn create_reminder(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(payload): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    create_row(&state, &session, EntityKind::Reminders, &payload, None).await
}

async fn update_reminder(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>> {
    update_row(&state, &session, EntityKind::Reminders, &id, &payload).await
}

async fn delete_reminder(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    delete_row(&state, &session, EntityKind::Reminders, &id).await
}

/// Parse an ISO-8601 datetime or bare date into a UTC timestamp.
fn parse_date(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&chrono::Utc));
    }
    let date = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

// ─── Deals ───────────────────────────────────────────────────

async fn list_deals(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<serde_json::Value>> {
    list_rows(&state, &session, EntityKind::Deals).await
}

async fn get_deal(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    get_row(&state, &session, EntityKind::Deals, &id).await
}

async fn create_deal(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(payload): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    create_row(&state, &session, EntityKind::Deals, &payload, None).await
}

async fn update_deal(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>> {
    update_row(&state, &session, EntityKind::Deals, &id, &payload).await
}

async fn delete_deal(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    delete_row(&state, &session, EntityKind::Deals, &id).await
}

// ─── Dashboard ───────────────────────────────────────────────

/// Aggregate counts for the dashboard view.
///
/// The three reads are independent GETs with no ordering dependency, so
/// they are issued concurrently.
async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<serde_json::Value>> {
    let client = sheets_client(&state, &session);

    let (contacts, companies, reminders) = tokio::try_join!(
        client.get_rows(EntityKind::Contacts.sheet_name()),
        client.get_rows(EntityKind::Companies.sheet_name()),
        client.get_rows(EntityKind::Reminders.sheet_name()),
    )?;

    let upcoming = reminders
        .iter()
        .filter(|r| r.get("is_done").map(String::as_str) != Some("TRUE"))
        .count();

    Ok(Json(serde_json::json!({
        "totalContacts": contacts.len(),
        "totalCompanies": companies.len(),
        "upcomingReminders": upcoming,
        "recentActivities": [],
    })))
}

// ─── Sheet initialization ────────────────────────────────────

/// Write missing header rows for every entity sheet. Idempotent.
async fn init_sheets(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<serde_json::Value>> {
    let client = sheets_client(&state, &session);
    for kind in EntityKind::ALL {
        client.initialize_sheet(kind.sheet_name(), kind.headers()).await?;
    }
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Sheets initialized",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_to_json_converts_reminder_is_done() {
        let mut row = Row::new();
        row.insert("id".to_string(), "r1".to_string());
        row.insert("is_done".to_string(), "TRUE".to_string());

        let json = row_to_json(EntityKind::Reminders, &row);
        assert_eq!(json["is_done"], serde_json::Value::Bool(true));

        row.insert("is_done".to_string(), "FALSE".to_string());
        let json = row_to_json(EntityKind::Reminders, &row);
        assert_eq!(json["is_done"], serde_json::Value::Bool(false));
    }

    #[test]
    fn test_row_to_json_leaves_other_entities_alone() {
        let mut row = Row::new();
        row.insert("is_done".to_string(), "TRUE".to_string());
        let json = row_to_json(EntityKind::Contacts, &row);
        assert_eq!(json["is_done"], serde_json::Value::String("TRUE".to_string()));
    }

    #[test]
    fn test_parse_date_variants() {
        assert!(parse_date("2026-03-01").is_some());
        assert!(parse_date("2026-03-01T10:30:00Z").is_some());
        assert!(parse_date("next tuesday").is_none());
    }
}
