// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod entity;
pub mod session;

pub use entity::{EntityKind, Row};
pub use session::{Session, UserInfo};
