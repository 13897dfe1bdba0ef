//! Fixed entity schemas and field sanitization.
//!
//! Each entity kind maps to one sheet (tab) of the backing spreadsheet.
//! Incoming payloads are filtered against a static allow-list before they
//! ever reach the data client; `created_at`/`updated_at` are owned by the
//! data client and stripped from caller input.

use crate::error::AppError;
use std::collections::BTreeMap;

/// One record within a sheet, keyed by column header.
pub type Row = BTreeMap<String, String>;

/// The fixed set of entity sheets. Not user-configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Contacts,
    Companies,
    Notes,
    Reminders,
    Deals,
}

impl EntityKind {
    /// All kinds, in spreadsheet tab order.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Contacts,
        EntityKind::Companies,
        EntityKind::Notes,
        EntityKind::Reminders,
        EntityKind::Deals,
    ];

    /// Sheet (tab) name in the backing spreadsheet.
    pub fn sheet_name(self) -> &'static str {
        match self {
            EntityKind::Contacts => "contacts",
            EntityKind::Companies => "companies",
            EntityKind::Notes => "notes",
            EntityKind::Reminders => "reminders",
            EntityKind::Deals => "deals",
        }
    }

    /// Capitalized record name for error messages.
    pub fn record_name(self) -> &'static str {
        match self {
            EntityKind::Contacts => "Contact",
            EntityKind::Companies => "Company",
            EntityKind::Notes => "Note",
            EntityKind::Reminders => "Reminder",
            EntityKind::Deals => "Deal",
        }
    }

    /// Header row for this sheet. Order defines column position.
    pub fn headers(self) -> &'static [&'static str] {
        match self {
            EntityKind::Contacts => &[
                "id", "name", "email", "phone", "company_id", "source", "notes", "created_at",
                "updated_at",
            ],
            EntityKind::Companies => &[
                "id", "name", "industry", "website", "address", "notes", "created_at",
                "updated_at",
            ],
            EntityKind::Notes => &["id", "contact_id", "content", "created_at"],
            EntityKind::Reminders => &["id", "contact_id", "title", "due_date", "is_done", "created_at"],
            EntityKind::Deals => &[
                "id",
                "title",
                "value",
                "stage",
                "contact_id",
                "company_id",
                "expected_close_date",
                "notes",
                "created_at",
                "updated_at",
            ],
        }
    }

    /// Field that must be present and non-empty when creating a record.
    pub fn required_field(self) -> &'static str {
        match self {
            EntityKind::Contacts | EntityKind::Companies => "name",
            EntityKind::Notes => "content",
            EntityKind::Reminders | EntityKind::Deals => "title",
        }
    }

    /// Whether a field may be supplied by the caller.
    ///
    /// Timestamps are maintained by the data client; everything else in the
    /// header set is fair game (including `id`, which the client generates
    /// only when absent).
    fn is_writable(self, field: &str) -> bool {
        field != "created_at" && field != "updated_at" && self.headers().contains(&field)
    }

    /// Sanitize an incoming JSON payload into a string-valued row.
    ///
    /// Unknown and non-writable keys are dropped. Scalar values are coerced
    /// to the sheet's string encoding (booleans as TRUE/FALSE); nested
    /// values are rejected with a 400 naming the field. When `creating`,
    /// the entity's required field must be present and non-empty.
    pub fn sanitize(self, payload: &serde_json::Value, creating: bool) -> Result<Row, AppError> {
        let object = payload
            .as_object()
            .ok_or_else(|| AppError::Validation("Request body must be a JSON object".to_string()))?;

        let mut row = Row::new();
        for (key, value) in object {
            if !self.is_writable(key) {
                continue;
            }
            let coerced = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Bool(b) => {
                    if *b { "TRUE".to_string() } else { "FALSE".to_string() }
                }
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Null => String::new(),
                _ => {
                    return Err(AppError::Validation(format!(
                        "Field '{key}' must be a scalar value"
                    )))
                }
            };
            row.insert(key.clone(), coerced);
        }

        if creating {
            let required = self.required_field();
            if row.get(required).map(String::as_str).unwrap_or("").is_empty() {
                return Err(AppError::Validation(format!(
                    "Missing required field '{required}'"
                )));
            }
        }

        Ok(row)
    }
}
