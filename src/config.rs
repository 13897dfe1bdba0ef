//! Application configuration loaded from environment variables.
//!
//! Google endpoint base URLs are configuration fields so integration tests
//! can point them at a local fake server.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Google OAuth client ID (public)
    pub google_client_id: String,
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// Secret used to derive the session cookie encryption key
    pub cookie_secret: String,
    /// Frontend URL for OAuth redirects and CORS/origin checks
    pub frontend_url: String,
    /// Server port
    pub port: u16,

    // --- Google API endpoint bases (overridable for tests) ---
    /// OAuth consent screen URL
    pub google_auth_url: String,
    /// OAuth token endpoint (code exchange and refresh)
    pub google_token_url: String,
    /// Userinfo endpoint
    pub google_userinfo_url: String,
    /// Drive files endpoint (spreadsheet search)
    pub drive_api_base: String,
    /// Sheets spreadsheets endpoint base
    pub sheets_api_base: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_ID"))?,
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_SECRET"))?,
            cookie_secret: env::var("COOKIE_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("COOKIE_SECRET"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            google_auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            google_token_url: "https://oauth2.googleapis.com/token".to_string(),
            google_userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            drive_api_base: "https://www.googleapis.com/drive/v3".to_string(),
            sheets_api_base: "https://sheets.googleapis.com/v4/spreadsheets".to_string(),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            google_client_id: "test-client-id".to_string(),
            google_client_secret: "test-client-secret".to_string(),
            cookie_secret: "test-cookie-secret-with-enough-entropy".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            google_auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            google_token_url: "https://oauth2.googleapis.com/token".to_string(),
            google_userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            drive_api_base: "https://www.googleapis.com/drive/v3".to_string(),
            sheets_api_base: "https://sheets.googleapis.com/v4/spreadsheets".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
