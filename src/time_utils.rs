// SPDX-License-Identifier: MIT

//! Shared helpers for date/time formatting.

use chrono::{SecondsFormat, Utc};

/// Current time as an ISO-8601 / RFC3339 string with a `Z` suffix.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time as milliseconds since the Unix epoch.
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}
