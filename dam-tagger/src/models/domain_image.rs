//! Application-facing image representation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a tag on a `DomainImage` came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagOrigin {
    /// Already present on the DAM; read-only locally
    Dam,
    /// Proposed by the image-analysis engine; not yet pushed
    Analysis,
}

/// Semantic tag attached to an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageTag {
    pub name: String,
    pub value: Option<String>,
    pub origin: TagOrigin,
    pub editable: bool,
}

impl ImageTag {
    pub fn from_dam(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
            origin: TagOrigin::Dam,
            editable: false,
        }
    }

    pub fn from_analysis(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            origin: TagOrigin::Analysis,
            editable: true,
        }
    }
}

/// Projection of a remote media record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainImage {
    pub id: String,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub tags: Vec<ImageTag>,
}

impl DomainImage {
    /// Add tag names from the image-analysis engine
    ///
    /// Names already on the image (any origin, case-insensitive) and blank
    /// names are ignored. Returns how many tags were added.
    pub fn add_analysis_tags<I, S>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() || self.has_tag(name) {
                continue;
            }
            self.tags.push(ImageTag::from_analysis(name));
            added += 1;
        }
        added
    }

    pub fn has_tag(&self, name: &str) -> bool {
        let wanted = name.trim().to_lowercase();
        self.tags.iter().any(|t| t.name.to_lowercase() == wanted)
    }

    /// Analysis-origin tag names, in insertion order
    pub fn analysis_tag_names(&self) -> Vec<String> {
        self.tags
            .iter()
            .filter(|t| t.origin == TagOrigin::Analysis)
            .map(|t| t.name.clone())
            .collect()
    }
}
