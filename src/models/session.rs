//! Session record carried in the encrypted cookie.

use serde::{Deserialize, Serialize};

/// Decrypted session record.
///
/// Owned exclusively by the requesting browser via an encrypted httpOnly
/// cookie; the server never persists it. Field names stay camelCase on the
/// wire so the cookie payload is stable across deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry, absolute epoch milliseconds
    pub expires_at: i64,
    pub email: String,
    pub name: String,
    pub picture: String,
    pub spreadsheet_id: String,
}

/// User profile fetched from the Google userinfo endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub picture: String,
}
