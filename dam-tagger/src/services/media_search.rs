//! Search flow: session → remote media query → `MediaMapper`

use crate::error::RemoteError;
use crate::models::{DomainImage, MediaQuery};
use crate::services::media_mapper::MediaMapper;
use crate::services::session_manager::SessionManager;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// One page of mapped search results
#[derive(Debug, Clone, Serialize)]
pub struct MediaSearchResult {
    pub images: Vec<DomainImage>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
}

pub struct MediaSearch {
    session: Arc<SessionManager>,
    mapper: MediaMapper,
}

impl MediaSearch {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            session,
            mapper: MediaMapper::new(),
        }
    }

    pub async fn search(&self, query: &MediaQuery) -> Result<MediaSearchResult, RemoteError> {
        if query.page == 0 {
            return Err(RemoteError::InvalidInput("page numbers start at 1".to_string()));
        }
        if query.page_size == 0 || query.page_size > MediaQuery::MAX_PAGE_SIZE {
            return Err(RemoteError::InvalidInput(format!(
                "page size must be between 1 and {}",
                MediaQuery::MAX_PAGE_SIZE
            )));
        }

        let api = self.session.api().clone();
        let page = self
            .session
            .with_credential(|credential| {
                let api = api.clone();
                let query = query.clone();
                async move { api.search_media(&credential, &query).await }
            })
            .await?;

        if !page.success {
            warn!(
                query = %query.text,
                message = ?page.message,
                "DAM rejected media query"
            );
            return Err(RemoteError::QueryRejected(
                "the DAM reported the query as unsuccessful".to_string(),
            ));
        }

        let images = self.mapper.map_page(&page);
        info!(
            query = %query.text,
            page = query.page,
            returned = images.len(),
            total = page.total_count,
            "Media search complete"
        );

        Ok(MediaSearchResult {
            images,
            total_count: page.total_count,
            page: query.page,
            page_size: query.page_size,
        })
    }
}
