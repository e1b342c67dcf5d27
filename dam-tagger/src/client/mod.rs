//! Remote DAM API surface
//!
//! `DamApi` is the transport seam: one async method per remote endpoint,
//! stateless apart from connection settings. Session handling lives in
//! `SessionManager`, which passes the credential into every call.

pub mod http_client;

pub use http_client::HttpDamClient;

use crate::error::{AuthError, RemoteError};
use crate::models::{
    MediaPage, MediaQuery, NewTag, NewTagValue, RemoteTagDefinition, RemoteTagValue,
    SessionCredential, TagAssignment,
};
use async_trait::async_trait;
use dam_common::Credentials;

#[async_trait]
pub trait DamApi: Send + Sync {
    /// `POST /login` - exchange credentials for a session credential
    async fn login(&self, credentials: &Credentials) -> Result<SessionCredential, AuthError>;

    /// `GET /tags` - full taxonomy listing
    async fn list_tags(
        &self,
        credential: &SessionCredential,
    ) -> Result<Vec<RemoteTagDefinition>, RemoteError>;

    /// `POST /tags/create` - the created record is not returned
    async fn create_tag(
        &self,
        credential: &SessionCredential,
        tag: &NewTag,
    ) -> Result<(), RemoteError>;

    /// `GET /tagValues?tagId&filter`
    async fn list_tag_values(
        &self,
        credential: &SessionCredential,
        tag_id: i64,
        filter: &str,
    ) -> Result<Vec<RemoteTagValue>, RemoteError>;

    /// `POST /tagValues/create`
    async fn create_tag_value(
        &self,
        credential: &SessionCredential,
        value: &NewTagValue,
    ) -> Result<RemoteTagValue, RemoteError>;

    /// `GET /media?query&page&pageSize`
    async fn search_media(
        &self,
        credential: &SessionCredential,
        query: &MediaQuery,
    ) -> Result<MediaPage, RemoteError>;

    /// Configured assignment endpoint (default `PUT /media/{id}/tags`)
    async fn assign_tags(
        &self,
        credential: &SessionCredential,
        media_id: &str,
        assignments: &[TagAssignment],
    ) -> Result<(), RemoteError>;
}
