// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod codec;
pub mod google;
pub mod sheets;

pub use google::{GoogleAuthClient, TokenResponse};
pub use sheets::SheetsClient;
