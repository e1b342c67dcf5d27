//! Raw media record → `DomainImage`
//!
//! Pure and total: absent optional fields fall back to defaults instead of
//! failing (dimensions and size 0, filename "Unknown", dates now).

use crate::models::{DomainImage, ImageTag, MediaPage, RawMediaRecord, RawTag};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::debug;

/// Filename used when the DAM record carries none
pub const UNKNOWN_FILE_NAME: &str = "Unknown";

#[derive(Debug, Clone, Copy, Default)]
pub struct MediaMapper;

impl MediaMapper {
    pub fn new() -> Self {
        Self
    }

    pub fn map(&self, raw: &RawMediaRecord) -> DomainImage {
        let now = Utc::now();

        let file_name = raw
            .file_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_FILE_NAME)
            .to_string();

        let image = DomainImage {
            id: raw.id.as_ref().map(id_to_string).unwrap_or_default(),
            file_name,
            width: raw.width.unwrap_or(0),
            height: raw.height.unwrap_or(0),
            file_size: raw.file_size.unwrap_or(0),
            description: raw.description.clone().unwrap_or_default(),
            created_at: raw.created_at.as_deref().and_then(parse_timestamp).unwrap_or(now),
            modified_at: raw.modified_at.as_deref().and_then(parse_timestamp).unwrap_or(now),
            tags: raw.tags.iter().map(map_tag).collect(),
        };

        if raw.file_name.is_none() {
            debug!(media_id = %image.id, "Media record has no file name");
        }

        image
    }

    pub fn map_page(&self, page: &MediaPage) -> Vec<DomainImage> {
        page.items.iter().map(|raw| self.map(raw)).collect()
    }
}

fn map_tag(tag: &RawTag) -> ImageTag {
    match tag {
        RawTag::Plain(name) => ImageTag::from_dam(name.clone(), None),
        RawTag::Pair { name, value } => ImageTag::from_dam(name.clone(), value.clone()),
    }
}

/// DAM ids arrive as numbers or strings
fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// RFC 3339 first, then the offset-less forms some DAMs emit (read as UTC)
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}
