//! dam-tagger library
//!
//! Session management and taxonomy resolution against a remote DAM REST API.
//! `DamService` wires the components together; the individual services are
//! public for callers that need finer control.

pub mod client;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{AuthError, RemoteError};

use crate::client::{DamApi, HttpDamClient};
use crate::models::{AssignmentSummary, DomainImage, MediaQuery, SemanticTag};
use crate::services::{
    MediaSearch, MediaSearchResult, SessionManager, TagAssignmentOrchestrator, TagResolver,
    TagValueResolver, TaxonomyCache,
};
use dam_common::events::EventBus;
use dam_common::{ConfigStore, DamConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Fully wired DAM tagging service
///
/// One instance holds one session; clone the `Arc`s it hands out rather than
/// building a second service against the same DAM identity.
pub struct DamService {
    session: Arc<SessionManager>,
    tag_resolver: Arc<TagResolver>,
    value_resolver: Arc<TagValueResolver>,
    orchestrator: TagAssignmentOrchestrator,
    search: MediaSearch,
    keywords_tag: String,
    event_bus: EventBus,
}

impl DamService {
    /// Build the HTTP client and every component from resolved configuration
    pub fn from_config(config: DamConfig, event_bus: EventBus) -> Result<Self, RemoteError> {
        let api: Arc<dyn DamApi> = Arc::new(HttpDamClient::new(&config)?);
        let keywords_tag = config.keywords_tag.clone();
        info!(
            base_url = %config.base_url,
            requests_per_second = config.requests_per_second,
            "DAM service configured"
        );
        Ok(Self::with_api(api, Arc::new(config), keywords_tag, event_bus))
    }

    /// Wire the components over an arbitrary transport
    pub fn with_api(
        api: Arc<dyn DamApi>,
        config: Arc<dyn ConfigStore>,
        keywords_tag: impl Into<String>,
        event_bus: EventBus,
    ) -> Self {
        let taxonomy = Arc::new(TaxonomyCache::new().with_event_bus(event_bus.clone()));
        let session = Arc::new(
            SessionManager::new(api, config, taxonomy).with_event_bus(event_bus.clone()),
        );
        let tag_resolver =
            Arc::new(TagResolver::new(session.clone()).with_event_bus(event_bus.clone()));
        let value_resolver =
            Arc::new(TagValueResolver::new(session.clone()).with_event_bus(event_bus.clone()));
        let orchestrator = TagAssignmentOrchestrator::new(
            session.clone(),
            tag_resolver.clone(),
            value_resolver.clone(),
        )
        .with_event_bus(event_bus.clone());
        let search = MediaSearch::new(session.clone());

        Self {
            session,
            tag_resolver,
            value_resolver,
            orchestrator,
            search,
            keywords_tag: keywords_tag.into(),
            event_bus,
        }
    }

    pub async fn search(&self, query: &MediaQuery) -> Result<MediaSearchResult, RemoteError> {
        self.search.search(query).await
    }

    pub async fn assign_tags(
        &self,
        media_id: &str,
        tags: &[SemanticTag],
        cancel: &CancellationToken,
    ) -> Result<AssignmentSummary, RemoteError> {
        self.orchestrator.assign_tags(media_id, tags, cancel).await
    }

    /// Assign bare keywords as values of the configured keywords tag
    pub async fn assign_keywords<S: AsRef<str>>(
        &self,
        media_id: &str,
        keywords: &[S],
        cancel: &CancellationToken,
    ) -> Result<AssignmentSummary, RemoteError> {
        let tags: Vec<SemanticTag> = keywords
            .iter()
            .map(|k| k.as_ref().trim())
            .filter(|k| !k.is_empty())
            .map(|k| SemanticTag::keyword(&self.keywords_tag, k))
            .collect();
        self.orchestrator.assign_tags(media_id, &tags, cancel).await
    }

    /// Push the analysis-origin tags of `image` to the DAM as keywords
    pub async fn assign_analysis_tags(
        &self,
        image: &DomainImage,
        cancel: &CancellationToken,
    ) -> Result<AssignmentSummary, RemoteError> {
        let keywords = image.analysis_tag_names();
        self.assign_keywords(&image.id, &keywords, cancel).await
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn taxonomy(&self) -> &Arc<TaxonomyCache> {
        self.session.taxonomy()
    }

    pub fn tag_resolver(&self) -> &Arc<TagResolver> {
        &self.tag_resolver
    }

    pub fn value_resolver(&self) -> &Arc<TagValueResolver> {
        &self.value_resolver
    }

    pub fn keywords_tag(&self) -> &str {
        &self.keywords_tag
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}
