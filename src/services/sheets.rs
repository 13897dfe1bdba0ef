// SPDX-License-Identifier: MIT

//! Google Sheets data client: row CRUD on one spreadsheet's 2-D grid.
//!
//! Database semantics are emulated on top of the values API: row 0 is the
//! header, `id` (a UUID column) is the only stable identifier, and the row
//! index is re-derived by linear scan on every mutating call. There is no
//! lock between the read and the write, so concurrent writers against the
//! same sheet can interleave; that race is accepted for a
//! single-user-per-spreadsheet CRM.

use crate::error::AppError;
use crate::models::Row;
use crate::time_utils::now_iso8601;
use serde::Deserialize;

/// Per-request Sheets client bound to one spreadsheet and access token.
#[derive(Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    access_token: String,
}

/// Response shape of the values API.
#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

impl SheetsClient {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        spreadsheet_id: String,
        access_token: String,
    ) -> Self {
        Self {
            http,
            base_url,
            spreadsheet_id,
            access_token,
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}{}", self.base_url, self.spreadsheet_id, endpoint)
    }

    /// Check response status, surfacing the upstream body on failure.
    async fn check_response(&self, response: reqwest::Response) -> Result<reqwest::Response, AppError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::SheetsApi(format!("HTTP {status}: {body}")))
    }

    /// Fetch a value range, e.g. `contacts` or `contacts!1:1`.
    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, AppError> {
        let response = self
            .http
            .get(self.url(&format!("/values/{}", urlencoding::encode(range))))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(e.to_string()))?;

        let range: ValueRange = self
            .check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::SheetsApi(format!("JSON parse error: {e}")))?;

        Ok(range.values)
    }

    /// Fetch just the header row of a sheet.
    async fn get_headers(&self, sheet: &str) -> Result<Vec<String>, AppError> {
        let mut values = self.get_values(&format!("{sheet}!1:1")).await?;
        Ok(if values.is_empty() {
            vec![]
        } else {
            values.swap_remove(0)
        })
    }

    /// Get all rows from a sheet as header-keyed records.
    ///
    /// A header-only or empty sheet is "no rows", not an error.
    pub async fn get_rows(&self, sheet: &str) -> Result<Vec<Row>, AppError> {
        let values = self.get_values(sheet).await?;
        Ok(rows_from_values(values))
    }

    /// Get a single row by its `id` field. O(n) linear scan; acceptable
    /// because target sheets are small single-tenant CRM data.
    pub async fn get_row_by_id(&self, sheet: &str, id: &str) -> Result<Option<Row>, AppError> {
        let rows = self.get_rows(sheet).await?;
        Ok(rows.into_iter().find(|row| row_id(row) == id))
    }

    /// Append a new row, generating `id`/`created_at`/`updated_at` when the
    /// caller omitted them.
    pub async fn append_row(&self, sheet: &str, mut data: Row) -> Result<Row, AppError> {
        let headers = self.get_headers(sheet).await?;
        if headers.is_empty() {
            return Err(AppError::Append(format!("Sheet '{sheet}' has no headers")));
        }

        if data.get("id").map(String::as_str).unwrap_or("").is_empty() {
            data.insert("id".to_string(), uuid::Uuid::new_v4().to_string());
        }
        let now = now_iso8601();
        data.entry("created_at".to_string()).or_insert_with(|| now.clone());
        data.entry("updated_at".to_string()).or_insert_with(|| now.clone());

        // Positional value array aligned to header order; missing fields
        // become empty cells. Keys outside the header set never reach the
        // sheet and are dropped from the returned record too.
        let values: Vec<String> = headers
            .iter()
            .map(|h| data.get(h).cloned().unwrap_or_default())
            .collect();
        data.retain(|key, _| headers.iter().any(|h| h == key));

        let response = self
            .http
            .post(self.url(&format!(
                "/values/{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
                urlencoding::encode(sheet)
            )))
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "values": [values] }))
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(e.to_string()))?;

        self.check_response(response).await?;
        Ok(data)
    }

    /// Update a row by id, merging `data` over the existing record and
    /// force-setting `updated_at`. Returns `None` (no write issued) when the
    /// id is absent. Last-write-wins: no optimistic-concurrency check.
    pub async fn update_row(
        &self,
        sheet: &str,
        id: &str,
        data: Row,
    ) -> Result<Option<Row>, AppError> {
        let rows = self.get_rows(sheet).await?;
        let Some(row_index) = rows.iter().position(|row| row_id(row) == id) else {
            return Ok(None);
        };

        let headers = self.get_headers(sheet).await?;

        let mut updated = rows[row_index].clone();
        updated.extend(data);
        updated.insert("updated_at".to_string(), now_iso8601());
        updated.retain(|key, _| headers.iter().any(|h| h == key));

        let values: Vec<String> = headers
            .iter()
            .map(|h| updated.get(h).cloned().unwrap_or_default())
            .collect();

        // 1-based sheet position: +1 for the header row, +1 for 0-based index
        let sheet_row = row_index + 2;
        let range = format!(
            "{}!A{}:{}{}",
            sheet,
            sheet_row,
            column_letter(headers.len()),
            sheet_row
        );

        let response = self
            .http
            .put(self.url(&format!(
                "/values/{}?valueInputOption=RAW",
                urlencoding::encode(&range)
            )))
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "values": [values] }))
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(e.to_string()))?;

        self.check_response(response).await?;
        Ok(Some(updated))
    }

    /// Delete a row by id via a single dimension-delete batch request.
    /// Returns `false` when the id is absent. The row index can shift
    /// between lookup and delete if another writer races us.
    pub async fn delete_row(&self, sheet: &str, id: &str) -> Result<bool, AppError> {
        let rows = self.get_rows(sheet).await?;
        let Some(row_index) = rows.iter().position(|row| row_id(row) == id) else {
            return Ok(false);
        };

        let sheet_id = self.resolve_sheet_id(sheet).await?;

        // 0-based grid index: +1 to skip the header row
        let start_index = row_index + 1;

        let response = self
            .http
            .post(self.url(":batchUpdate"))
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({
                "requests": [{
                    "deleteDimension": {
                        "range": {
                            "sheetId": sheet_id,
                            "dimension": "ROWS",
                            "startIndex": start_index,
                            "endIndex": start_index + 1,
                        },
                    },
                }],
            }))
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(e.to_string()))?;

        self.check_response(response).await?;
        Ok(true)
    }

    /// Write the header row only if the first row is currently empty.
    /// Idempotent; never overwrites existing headers.
    pub async fn initialize_sheet(&self, sheet: &str, headers: &[&str]) -> Result<(), AppError> {
        let existing = self.get_values(&format!("{sheet}!1:1")).await?;
        if !existing.is_empty() {
            return Ok(());
        }

        let response = self
            .http
            .put(self.url(&format!(
                "/values/{}?valueInputOption=RAW",
                urlencoding::encode(&format!("{sheet}!A1"))
            )))
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "values": [headers] }))
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(e.to_string()))?;

        self.check_response(response).await?;
        Ok(())
    }

    /// Resolve a tab's internal numeric id (distinct from the spreadsheet id
    /// and from the row `id` column) from spreadsheet metadata.
    async fn resolve_sheet_id(&self, sheet: &str) -> Result<i64, AppError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct SheetProperties {
            sheet_id: i64,
            title: String,
        }
        #[derive(Deserialize)]
        struct SheetEntry {
            properties: SheetProperties,
        }
        #[derive(Deserialize)]
        struct Metadata {
            #[serde(default)]
            sheets: Vec<SheetEntry>,
        }

        let response = self
            .http
            .get(self.url(""))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(e.to_string()))?;

        let metadata: Metadata = self
            .check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::SheetsApi(format!("Metadata parse error: {e}")))?;

        metadata
            .sheets
            .into_iter()
            .find(|entry| entry.properties.title == sheet)
            .map(|entry| entry.properties.sheet_id)
            .ok_or_else(|| AppError::SheetsApi(format!("Sheet '{sheet}' not found")))
    }
}

fn row_id(row: &Row) -> &str {
    row.get("id").map(String::as_str).unwrap_or("")
}

/// Zip a raw value grid into header-keyed rows. Fewer than two rows
/// (header-only or empty) normalizes to no rows.
fn rows_from_values(values: Vec<Vec<String>>) -> Vec<Row> {
    let mut iter = values.into_iter();
    let Some(headers) = iter.next() else {
        return vec![];
    };

    iter.map(|cells| {
        headers
            .iter()
            .enumerate()
            .map(|(i, header)| (header.clone(), cells.get(i).cloned().unwrap_or_default()))
            .collect()
    })
    .collect()
}

/// 1-based column number to A1-notation letters (1 -> A, 27 -> AA).
fn column_letter(mut n: usize) -> String {
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_else(|_| "A".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(9), "I");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
    }

    #[test]
    fn test_rows_from_values_pads_short_rows() {
        let values = vec![
            vec!["id".to_string(), "name".to_string(), "email".to_string()],
            vec!["1".to_string(), "Ann".to_string()],
        ];
        let rows = rows_from_values(values);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name").unwrap(), "Ann");
        assert_eq!(rows[0].get("email").unwrap(), "");
    }

    #[test]
    fn test_rows_from_values_header_only_is_empty() {
        assert!(rows_from_values(vec![]).is_empty());
        assert!(rows_from_values(vec![vec!["id".to_string()]]).is_empty());
    }
}
