use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title stored when the uploader does not provide one.
pub const DEFAULT_TITLE: &str = "Untitled";

/// Width of the `title` column.
pub const MAX_TITLE_CHARS: usize = 255;

/// An uploaded recording as exposed by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub id: Uuid,
    pub title: Option<String>,
    pub filename: String,
    pub size: u64,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl Recording {
    /// Title to show in listings.
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => DEFAULT_TITLE,
        }
    }
}

/// Values known before insertion. `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecording {
    pub title: String,
    pub filename: String,
    pub size: u64,
    pub url: String,
}

/// Normalize a user supplied title: blank becomes [`DEFAULT_TITLE`], long
/// titles are cut to [`MAX_TITLE_CHARS`] characters.
pub fn normalize_title(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(t) if !t.is_empty() => t.chars().take(MAX_TITLE_CHARS).collect(),
        _ => DEFAULT_TITLE.to_string(),
    }
}

/// Fixed-width timestamp encoding used for the `created_at` column.
///
/// Microsecond precision and a `Z` suffix keep lexical and chronological
/// order identical.
pub fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
