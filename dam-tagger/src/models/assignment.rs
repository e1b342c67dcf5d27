//! Tag assignment inputs and results

use crate::error::RemoteError;
use crate::models::{AssignmentPair, RemoteTagDefinition, RemoteTagValue};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Tag to assign: a taxonomy tag name and the literal value under it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticTag {
    pub name: String,
    pub value: String,
}

impl SemanticTag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Bare keyword filed under the keywords tag
    pub fn keyword(keywords_tag: &str, keyword: impl Into<String>) -> Self {
        Self::new(keywords_tag, keyword)
    }
}

impl FromStr for SemanticTag {
    type Err = String;

    /// Parses `Name=Value`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            return Err(format!("tag name and value must be non-empty in '{}'", s));
        }
        Ok(Self::new(name, value))
    }
}

/// Resolved `(tag, value)` pair ready to send. Lives for one assignment call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAssignment {
    pub tag_id: i64,
    pub tag_value_id: i64,
    /// Semantic tag name this pair was resolved from
    pub tag_name: String,
}

impl TagAssignment {
    /// Build from resolved records; `None` if the tag does not allow assignment
    pub fn from_resolved(
        tag: &RemoteTagDefinition,
        value: &RemoteTagValue,
        tag_name: impl Into<String>,
    ) -> Option<Self> {
        if !tag.allows_assignment {
            return None;
        }
        Some(Self {
            tag_id: tag.id,
            tag_value_id: value.id,
            tag_name: tag_name.into(),
        })
    }

    pub fn pair(&self) -> AssignmentPair {
        AssignmentPair {
            tag_id: self.tag_id,
            tag_value_id: self.tag_value_id,
        }
    }
}

/// Tag that could not be resolved, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTag {
    pub name: String,
    pub reason: String,
}

/// Outcome of a successful (possibly partial) assignment call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentSummary {
    pub media_id: String,
    pub assigned_count: usize,
    pub skipped: Vec<SkippedTag>,
}

impl AssignmentSummary {
    pub fn skipped_names(&self) -> Vec<String> {
        self.skipped.iter().map(|s| s.name.clone()).collect()
    }

    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// User-facing result of an assignment call
///
/// Carries a success flag and either the summary counts or an error
/// description. Raw remote bodies never reach this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentReport {
    pub success: bool,
    pub media_id: String,
    pub assigned_count: usize,
    pub skipped_names: Vec<String>,
    pub error: Option<String>,
}

impl AssignmentReport {
    pub fn from_result(media_id: &str, result: &Result<AssignmentSummary, RemoteError>) -> Self {
        match result {
            Ok(summary) => Self {
                success: true,
                media_id: summary.media_id.clone(),
                assigned_count: summary.assigned_count,
                skipped_names: summary.skipped_names(),
                error: None,
            },
            Err(err) => Self {
                success: false,
                media_id: media_id.to_string(),
                assigned_count: 0,
                skipped_names: Vec::new(),
                error: Some(err.to_string()),
            },
        }
    }
}
