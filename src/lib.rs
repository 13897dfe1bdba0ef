// SPDX-License-Identifier: MIT

//! SheetCRM: a small CRM whose backing store is the user's own
//! Google Sheets spreadsheet.
//!
//! This crate provides the backend API: encrypted cookie sessions carrying
//! OAuth tokens, transparent access-token refresh, and row CRUD mapped onto
//! a spreadsheet's 2-D grid.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::GoogleAuthClient;

/// Shared application state.
///
/// The server is stateless per request: sessions live in the client's
/// cookie, and the only shared pieces are config, the Google OAuth client
/// and the pooled HTTP client used for Sheets calls.
pub struct AppState {
    pub config: Config,
    pub google: GoogleAuthClient,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let google = GoogleAuthClient::new(&config);
        Self {
            config,
            google,
            http: reqwest::Client::new(),
        }
    }
}
