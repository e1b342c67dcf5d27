//! In-memory taxonomy cache
//!
//! Holds an immutable snapshot of the remote tag list keyed by normalized
//! (trimmed, lowercased) name. A refresh builds a complete new snapshot and
//! publishes it with a single pointer swap, so readers see either the old or
//! the new taxonomy, never a mix. Refreshes are serialized; lookups never wait
//! on a refresh in flight.

use crate::client::DamApi;
use crate::error::RemoteError;
use crate::models::{RemoteTagDefinition, SessionCredential};
use chrono::{DateTime, Utc};
use dam_common::events::{EventBus, TaggingEvent};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Cache key for a tag name
pub fn normalize_tag_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// One published view of the taxonomy
#[derive(Debug, Default)]
pub struct TaxonomySnapshot {
    epoch: u64,
    fetched_at: Option<DateTime<Utc>>,
    by_name: HashMap<String, RemoteTagDefinition>,
}

impl TaxonomySnapshot {
    /// Build a snapshot from a remote listing
    ///
    /// When two entries share a name but carry different guids, the first one
    /// listed wins.
    fn build(definitions: Vec<RemoteTagDefinition>, epoch: u64) -> Self {
        let mut by_name: HashMap<String, RemoteTagDefinition> =
            HashMap::with_capacity(definitions.len());

        for definition in definitions {
            let key = normalize_tag_name(&definition.name);
            if key.is_empty() {
                debug!(guid = %definition.guid, "Ignoring tag with blank name");
                continue;
            }

            match by_name.get(&key) {
                Some(existing) if existing.guid != definition.guid => {
                    warn!(
                        tag = %definition.name,
                        kept_guid = %existing.guid,
                        dropped_guid = %definition.guid,
                        "Remote taxonomy lists the same tag name twice; keeping the first"
                    );
                }
                Some(_) => {}
                None => {
                    by_name.insert(key, definition);
                }
            }
        }

        Self {
            epoch,
            fetched_at: Some(Utc::now()),
            by_name,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn get(&self, name: &str) -> Option<&RemoteTagDefinition> {
        self.by_name.get(&normalize_tag_name(name))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

pub struct TaxonomyCache {
    snapshot: RwLock<Arc<TaxonomySnapshot>>,
    refresh_lock: Mutex<()>,
    event_bus: Option<EventBus>,
}

impl TaxonomyCache {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(TaxonomySnapshot::default())),
            refresh_lock: Mutex::new(()),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Current snapshot (cheap `Arc` clone)
    pub fn snapshot(&self) -> Arc<TaxonomySnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn publish(&self, next: TaxonomySnapshot) {
        let mut slot = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Arc::new(next);
    }

    /// Fetch the full remote tag list and publish it as a new snapshot
    pub async fn refresh(
        &self,
        api: &dyn DamApi,
        credential: &SessionCredential,
    ) -> Result<(), RemoteError> {
        let _guard = self.refresh_lock.lock().await;
        self.fetch_and_publish(api, credential).await
    }

    /// Refresh only if no listing newer than `seen_epoch` has been published
    ///
    /// A cleared cache always refreshes.
    pub async fn refresh_if_older(
        &self,
        api: &dyn DamApi,
        credential: &SessionCredential,
        seen_epoch: u64,
    ) -> Result<(), RemoteError> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.snapshot();
        if current.epoch() > seen_epoch && current.fetched_at().is_some() {
            debug!(seen_epoch, epoch = current.epoch(), "Taxonomy already refreshed");
            return Ok(());
        }
        self.fetch_and_publish(api, credential).await
    }

    /// Caller holds `refresh_lock`
    async fn fetch_and_publish(
        &self,
        api: &dyn DamApi,
        credential: &SessionCredential,
    ) -> Result<(), RemoteError> {
        let definitions = api.list_tags(credential).await?;
        let epoch = self.snapshot().epoch() + 1;
        let next = TaxonomySnapshot::build(definitions, epoch);
        let tag_count = next.len();

        self.publish(next);

        info!(tag_count, epoch, "Taxonomy refreshed");
        if let Some(bus) = &self.event_bus {
            bus.emit_lossy(TaggingEvent::TaxonomyRefreshed {
                tag_count,
                epoch,
                timestamp: Utc::now(),
            });
        }

        Ok(())
    }

    /// Case-insensitive lookup against the current snapshot
    pub fn lookup(&self, name: &str) -> Option<RemoteTagDefinition> {
        self.snapshot().get(name).cloned()
    }

    /// All cached definitions, sorted by name
    pub fn definitions(&self) -> Vec<RemoteTagDefinition> {
        let snapshot = self.snapshot();
        let mut definitions: Vec<RemoteTagDefinition> = snapshot.by_name.values().cloned().collect();
        definitions.sort_by_key(|d| normalize_tag_name(&d.name));
        definitions
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn epoch(&self) -> u64 {
        self.snapshot().epoch()
    }

    /// Publish an empty snapshot (session dropped)
    ///
    /// Waits for a refresh in flight so its listing cannot land after the clear.
    pub async fn clear(&self) {
        let _guard = self.refresh_lock.lock().await;
        let epoch = self.snapshot().epoch() + 1;
        self.publish(TaxonomySnapshot {
            epoch,
            fetched_at: None,
            by_name: HashMap::new(),
        });
    }
}

impl Default for TaxonomyCache {
    fn default() -> Self {
        Self::new()
    }
}
