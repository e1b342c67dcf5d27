//! Session, taxonomy resolution, assignment and search services
//!
//! Dependency order: `SessionManager` owns the credential and the
//! `TaxonomyCache`; `TagResolver` and `TagValueResolver` go through the
//! session; `TagAssignmentOrchestrator` drives both resolvers per call.

pub mod media_mapper;
pub mod media_search;
pub mod session_manager;
pub mod tag_assignment;
pub mod tag_resolver;
pub mod tag_value_resolver;
pub mod taxonomy_cache;

#[cfg(test)]
pub(crate) mod testing;

pub use media_mapper::{MediaMapper, UNKNOWN_FILE_NAME};
pub use media_search::{MediaSearch, MediaSearchResult};
pub use session_manager::SessionManager;
pub use tag_assignment::TagAssignmentOrchestrator;
pub use tag_resolver::TagResolver;
pub use tag_value_resolver::TagValueResolver;
pub use taxonomy_cache::{normalize_tag_name, TaxonomyCache, TaxonomySnapshot};

use crate::error::RemoteError;
use tokio_util::sync::CancellationToken;

/// Gate in front of every remote step
pub(crate) fn check_cancelled(cancel: &CancellationToken) -> Result<(), RemoteError> {
    if cancel.is_cancelled() {
        return Err(RemoteError::Cancelled);
    }
    Ok(())
}
