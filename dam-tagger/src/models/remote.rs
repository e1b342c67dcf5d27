//! Wire types exchanged with the DAM REST API

use serde::{Deserialize, Deserializer, Serialize};

/// Tag definition as listed by `GET /tags`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTagDefinition {
    pub id: i64,
    pub guid: String,
    pub name: String,
    #[serde(default)]
    pub is_multi_value: bool,
    #[serde(default)]
    pub is_hierarchical: bool,
    #[serde(default = "default_true")]
    pub allows_assignment: bool,
}

/// Value record under a tag, from `GET /tagValues` or `POST /tagValues/create`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTagValue {
    pub id: i64,
    #[serde(default)]
    pub tag_id: i64,
    pub text: String,
    #[serde(default)]
    pub raw_value: String,
    #[serde(default)]
    pub has_children: bool,
}

fn default_true() -> bool {
    true
}

/// Body of `POST /tags/create`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTag {
    pub name: String,
    #[serde(rename = "type")]
    pub tag_type: String,
    pub multi_value: bool,
    pub hierarchical: bool,
}

impl NewTag {
    /// Default properties for tags created on demand: string-typed,
    /// multi-value, flat.
    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag_type: "string".to_string(),
            multi_value: true,
            hierarchical: false,
        }
    }
}

/// Body of `POST /tagValues/create`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTagValue {
    pub tag_guid: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
}

/// Media query parameters for `GET /media`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaQuery {
    pub text: String,
    /// 1-based page number
    pub page: u32,
    pub page_size: u32,
}

impl MediaQuery {
    pub const DEFAULT_PAGE_SIZE: u32 = 50;
    pub const MAX_PAGE_SIZE: u32 = 500;

    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }
}

/// One page of raw media records
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPage {
    #[serde(
        default,
        alias = "Items",
        alias = "records",
        deserialize_with = "null_as_empty"
    )]
    pub items: Vec<RawMediaRecord>,
    #[serde(default, alias = "TotalCount")]
    pub total_count: u64,
    #[serde(default, alias = "Success")]
    pub success: bool,
    #[serde(default, alias = "Message")]
    pub message: Option<String>,
}

/// Media record as returned by the DAM, every field optional
///
/// Accepts both camelCase and PascalCase field names since DAM deployments
/// differ on casing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMediaRecord {
    #[serde(default, alias = "Id", alias = "ID")]
    pub id: Option<serde_json::Value>,
    #[serde(default, alias = "FileName", alias = "filename")]
    pub file_name: Option<String>,
    #[serde(default, alias = "Width")]
    pub width: Option<u32>,
    #[serde(default, alias = "Height")]
    pub height: Option<u32>,
    #[serde(default, alias = "FileSize", alias = "size")]
    pub file_size: Option<u64>,
    #[serde(default, alias = "Description")]
    pub description: Option<String>,
    #[serde(default, alias = "CreatedAt", alias = "DateCreated")]
    pub created_at: Option<String>,
    #[serde(default, alias = "ModifiedAt", alias = "DateModified")]
    pub modified_at: Option<String>,
    #[serde(default, alias = "Tags", deserialize_with = "null_as_empty")]
    pub tags: Vec<RawTag>,
}

/// Some DAMs send `null` instead of an empty list
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Tag entry on a raw media record: a bare name or a name/value pair
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawTag {
    Plain(String),
    Pair {
        #[serde(alias = "Name")]
        name: String,
        #[serde(default, alias = "Value")]
        value: Option<String>,
    },
}

/// Single `(tagId, tagValueId)` pair in the assignment body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentPair {
    pub tag_id: i64,
    pub tag_value_id: i64,
}

/// Body of the assignment call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentBody {
    pub assignments: Vec<AssignmentPair>,
}

/// List responses come either bare or wrapped in `{ "items": [...] }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListEnvelope<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "Items")]
        items: Vec<T>,
    },
}

impl<T> ListEnvelope<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            ListEnvelope::Bare(items) => items,
            ListEnvelope::Wrapped { items } => items,
        }
    }
}
