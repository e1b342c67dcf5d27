//! Tag ensure-exists protocol
//!
//! local cache → refreshed cache → remote create. Most tags already exist, so
//! the common case costs no remote call at all.
//!
//! Duplicate creation: two callers can both see a tag missing and both try to
//! create it. Inside one process the creation lock plus a re-check prevents
//! that. Across processes the DAM answers the loser with HTTP 409, which is
//! treated as "already exists" and resolved by refreshing the cache.
//!
//! The cancellation token is checked before each of the remote steps.

use crate::error::RemoteError;
use crate::models::{NewTag, RemoteTagDefinition};
use crate::services::check_cancelled;
use crate::services::session_manager::SessionManager;
use chrono::Utc;
use dam_common::events::{EventBus, TaggingEvent};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct TagResolver {
    session: Arc<SessionManager>,
    creation_lock: Mutex<()>,
    event_bus: Option<EventBus>,
}

impl TagResolver {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            session,
            creation_lock: Mutex::new(()),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Return the definition for `name`, creating the tag remotely if absent
    pub async fn ensure_tag_exists(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<RemoteTagDefinition, RemoteError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RemoteError::InvalidTagName(name.to_string()));
        }

        let cache = self.session.taxonomy();

        // Step 1: current snapshot
        if let Some(definition) = cache.lookup(name) {
            debug!(tag = %name, guid = %definition.guid, "Tag resolved from cache");
            return Ok(definition);
        }

        // Step 2: the tag may have been created out-of-band
        check_cancelled(cancel)?;
        self.refresh(name).await?;
        if let Some(definition) = cache.lookup(name) {
            debug!(tag = %name, guid = %definition.guid, "Tag resolved after refresh");
            return Ok(definition);
        }

        // Step 3: create
        let _guard = self.creation_lock.lock().await;
        if let Some(definition) = cache.lookup(name) {
            debug!(tag = %name, "Tag created by a concurrent caller");
            return Ok(definition);
        }
        check_cancelled(cancel)?;

        let request = NewTag::custom(name);
        let api = self.session.api().clone();
        let created = self
            .session
            .with_credential(|credential| {
                let api = api.clone();
                let request = request.clone();
                async move { api.create_tag(&credential, &request).await }
            })
            .await;

        match created {
            Ok(()) => {
                info!(tag = %name, "Tag created in DAM taxonomy");
                if let Some(bus) = &self.event_bus {
                    bus.emit_lossy(TaggingEvent::TagCreated {
                        name: name.to_string(),
                        timestamp: Utc::now(),
                    });
                }
            }
            Err(e) if e.is_conflict() => {
                warn!(
                    tag = %name,
                    "Tag creation reported a conflict; assuming it already exists"
                );
            }
            Err(e) if e.is_auth_failure() => return Err(e),
            Err(e) => {
                warn!(tag = %name, error = %e, remote_status = ?e.remote_status(), "Tag creation failed");
                return Err(RemoteError::TagCreationFailed {
                    name: name.to_string(),
                    reason: e.to_string(),
                });
            }
        }

        // Step 4: creation does not return the record; read it back
        check_cancelled(cancel)?;
        self.refresh(name).await?;
        cache.lookup(name).ok_or_else(|| {
            warn!(tag = %name, "Tag still missing from taxonomy after creation");
            RemoteError::TagCreationFailed {
                name: name.to_string(),
                reason: "tag not listed after creation".to_string(),
            }
        })
    }

    /// Refresh the taxonomy unless a newer listing lands meanwhile (the
    /// post-login refresh of a retried call, or a concurrent resolver)
    async fn refresh(&self, name: &str) -> Result<(), RemoteError> {
        let api = self.session.api().clone();
        let cache = self.session.taxonomy().clone();
        let seen_epoch = cache.epoch();
        let result = self
            .session
            .with_credential(|credential| {
                let api = api.clone();
                let cache = cache.clone();
                async move {
                    cache
                        .refresh_if_older(api.as_ref(), &credential, seen_epoch)
                        .await
                }
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_auth_failure() => Err(e),
            Err(e) => Err(RemoteError::TagCreationFailed {
                name: name.to_string(),
                reason: format!("taxonomy refresh failed: {}", e),
            }),
        }
    }
}
