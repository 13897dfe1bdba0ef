// SPDX-License-Identifier: MIT

//! Google OAuth client: consent URL, code exchange, token refresh,
//! userinfo, and find-or-create of the backing spreadsheet in Drive.
//!
//! All calls are single-attempt; a refresh failure means the session is
//! invalid, not a transient condition to retry.

use crate::config::Config;
use crate::error::AppError;
use crate::models::{EntityKind, UserInfo};
use serde::Deserialize;

/// OAuth scopes: Sheets read/write, Drive file access (to create/find the
/// data spreadsheet), and the user's email/profile.
const SCOPES: [&str; 4] = [
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.file",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
];

/// Fixed name of the user's data spreadsheet in Drive.
const SPREADSHEET_NAME: &str = "SheetCRM Data";

/// Token endpoint response (code exchange and refresh).
///
/// Google omits `refresh_token` on refresh responses and may omit it on
/// repeat code exchanges despite `prompt=consent`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds from now
    pub expires_in: i64,
}

/// Google OAuth / Drive / Sheets provisioning client.
#[derive(Clone)]
pub struct GoogleAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
    drive_api_base: String,
    sheets_api_base: String,
}

impl GoogleAuthClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            auth_url: config.google_auth_url.clone(),
            token_url: config.google_token_url.clone(),
            userinfo_url: config.google_userinfo_url.clone(),
            drive_api_base: config.drive_api_base.clone(),
            sheets_api_base: config.sheets_api_base.clone(),
        }
    }

    /// Build the consent screen URL.
    ///
    /// `access_type=offline` plus `prompt=consent` forces Google to issue a
    /// refresh token even on repeat logins.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        let scope = SCOPES.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&include_granted_scopes=true&state={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for tokens. One round trip.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::AuthExchange(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::AuthExchange(format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::AuthExchange(format!("JSON parse error: {e}")))
    }

    /// Refresh an expired access token. Single attempt; callers must treat
    /// failure as "session invalid".
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Refresh(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Refresh(format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Refresh(format!("JSON parse error: {e}")))
    }

    /// Fetch the authenticated user's profile.
    pub async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfo, AppError> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::UserInfo(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::UserInfo(format!("HTTP {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::UserInfo(format!("JSON parse error: {e}")))
    }

    /// Find the user's data spreadsheet in Drive, creating it (with one tab
    /// per entity and header rows) when absent.
    ///
    /// Idempotent as long as the user doesn't rename or trash the sheet; if
    /// they do, we fall through and create a fresh one.
    pub async fn find_or_create_spreadsheet(
        &self,
        access_token: &str,
    ) -> Result<String, AppError> {
        if let Some(id) = self.find_spreadsheet(access_token).await? {
            tracing::debug!(spreadsheet_id = %id, "Found existing data spreadsheet");
            return Ok(id);
        }

        let id = self.create_spreadsheet(access_token).await?;
        tracing::info!(spreadsheet_id = %id, "Created new data spreadsheet");
        Ok(id)
    }

    /// Search Drive for the fixed-name spreadsheet.
    async fn find_spreadsheet(&self, access_token: &str) -> Result<Option<String>, AppError> {
        #[derive(Deserialize)]
        struct DriveFile {
            id: String,
        }
        #[derive(Deserialize)]
        struct DriveList {
            #[serde(default)]
            files: Vec<DriveFile>,
        }

        let query = format!(
            "name='{SPREADSHEET_NAME}' and mimeType='application/vnd.google-apps.spreadsheet' and trashed=false"
        );

        let response = self
            .http
            .get(format!("{}/files", self.drive_api_base))
            .bearer_auth(access_token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name)"),
                ("spaces", "drive"),
            ])
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(format!("Drive search failed: {e}")))?;

        // A failed search is not fatal; fall through to creation.
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Drive search failed, will create spreadsheet");
            return Ok(None);
        }

        let list: DriveList = response
            .json()
            .await
            .map_err(|e| AppError::SheetsApi(format!("Drive search parse error: {e}")))?;

        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    /// Create the spreadsheet with one tab per entity, then write all header
    /// rows in a single values batch call.
    async fn create_spreadsheet(&self, access_token: &str) -> Result<String, AppError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Created {
            spreadsheet_id: String,
        }

        let tabs: Vec<serde_json::Value> = EntityKind::ALL
            .iter()
            .enumerate()
            .map(|(index, kind)| {
                serde_json::json!({
                    "properties": {"sheetId": index, "title": kind.sheet_name()}
                })
            })
            .collect();

        let response = self
            .http
            .post(&self.sheets_api_base)
            .bearer_auth(access_token)
            .json(&serde_json::json!({
                "properties": {"title": SPREADSHEET_NAME},
                "sheets": tabs,
            }))
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(format!("Spreadsheet creation failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::SheetsApi(format!(
                "Spreadsheet creation failed: HTTP {status}: {body}"
            )));
        }

        let created: Created = response
            .json()
            .await
            .map_err(|e| AppError::SheetsApi(format!("Creation response parse error: {e}")))?;

        // Header rows for every tab in one batch write
        let data: Vec<serde_json::Value> = EntityKind::ALL
            .iter()
            .map(|kind| {
                serde_json::json!({
                    "range": format!("{}!A1", kind.sheet_name()),
                    "values": [kind.headers()],
                })
            })
            .collect();

        let response = self
            .http
            .post(format!(
                "{}/{}/values:batchUpdate",
                self.sheets_api_base, created.spreadsheet_id
            ))
            .bearer_auth(access_token)
            .json(&serde_json::json!({
                "valueInputOption": "RAW",
                "data": data,
            }))
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(format!("Header initialization failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::SheetsApi(format!(
                "Header initialization failed: HTTP {status}: {body}"
            )));
        }

        Ok(created.spreadsheet_id)
    }
}
