//! Tag-value ensure-exists protocol
//!
//! Filtered remote lookup first, create under the tag's guid on a miss. The
//! remote filter may match substrings, so the match is re-checked locally as a
//! case-insensitive exact comparison on `text`. With several equal matches the
//! first one returned by the DAM wins. A 409 on creation means another caller
//! created the value first; it is looked up again.

use crate::error::RemoteError;
use crate::models::{NewTagValue, RemoteTagDefinition, RemoteTagValue};
use crate::services::check_cancelled;
use crate::services::session_manager::SessionManager;
use chrono::Utc;
use dam_common::events::{EventBus, TaggingEvent};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct TagValueResolver {
    session: Arc<SessionManager>,
    event_bus: Option<EventBus>,
}

impl TagValueResolver {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            session,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Return the value record for `value` under `tag`, creating it if absent
    pub async fn ensure_tag_value_exists(
        &self,
        tag: &RemoteTagDefinition,
        value: &str,
        cancel: &CancellationToken,
    ) -> Result<RemoteTagValue, RemoteError> {
        self.ensure_tag_value_exists_under(tag, value, None, cancel)
            .await
    }

    /// Same as `ensure_tag_value_exists`, creating under `parent_id` for
    /// hierarchical tags
    pub async fn ensure_tag_value_exists_under(
        &self,
        tag: &RemoteTagDefinition,
        value: &str,
        parent_id: Option<i64>,
        cancel: &CancellationToken,
    ) -> Result<RemoteTagValue, RemoteError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(RemoteError::InvalidTagValue {
                tag: tag.name.clone(),
                value: value.to_string(),
            });
        }

        check_cancelled(cancel)?;
        if let Some(existing) = self.find_value(tag, value).await? {
            debug!(tag = %tag.name, value = %value, value_id = existing.id, "Tag value found");
            return Ok(existing);
        }

        check_cancelled(cancel)?;
        let request = NewTagValue {
            tag_guid: tag.guid.clone(),
            value: value.to_string(),
            parent_id,
        };
        let api = self.session.api().clone();
        let created = self
            .session
            .with_credential(|credential| {
                let api = api.clone();
                let request = request.clone();
                async move { api.create_tag_value(&credential, &request).await }
            })
            .await;

        match created {
            Ok(mut created) => {
                if created.tag_id == 0 {
                    created.tag_id = tag.id;
                }
                info!(tag = %tag.name, value = %value, value_id = created.id, "Tag value created");
                if let Some(bus) = &self.event_bus {
                    bus.emit_lossy(TaggingEvent::TagValueCreated {
                        tag_name: tag.name.clone(),
                        value: value.to_string(),
                        timestamp: Utc::now(),
                    });
                }
                Ok(created)
            }
            Err(e) if e.is_conflict() => {
                warn!(
                    tag = %tag.name,
                    value = %value,
                    "Tag value creation reported a conflict; looking it up again"
                );
                check_cancelled(cancel)?;
                self.find_value(tag, value)
                    .await?
                    .ok_or_else(|| RemoteError::TagValueCreationFailed {
                        tag: tag.name.clone(),
                        value: value.to_string(),
                        reason: "conflict reported but value not found".to_string(),
                    })
            }
            Err(e) if e.is_auth_failure() => Err(e),
            Err(e) => {
                warn!(
                    tag = %tag.name,
                    value = %value,
                    error = %e,
                    remote_status = ?e.remote_status(),
                    "Tag value creation failed"
                );
                Err(RemoteError::TagValueCreationFailed {
                    tag: tag.name.clone(),
                    value: value.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn find_value(
        &self,
        tag: &RemoteTagDefinition,
        value: &str,
    ) -> Result<Option<RemoteTagValue>, RemoteError> {
        let api = self.session.api().clone();
        let tag_id = tag.id;
        let filter = value.to_string();
        let values = self
            .session
            .with_credential(|credential| {
                let api = api.clone();
                let filter = filter.clone();
                async move { api.list_tag_values(&credential, tag_id, &filter).await }
            })
            .await?;

        let wanted = value.to_lowercase();
        Ok(values
            .into_iter()
            .find(|candidate| candidate.text.trim().to_lowercase() == wanted)
            .map(|mut found| {
                if found.tag_id == 0 {
                    found.tag_id = tag.id;
                }
                found
            }))
    }
}
