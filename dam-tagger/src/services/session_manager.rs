//! Session lifecycle
//!
//! Owns the single session credential for a service instance. Login happens
//! lazily on the first authenticated call and again only after the credential
//! is invalidated. A successful login triggers a taxonomy refresh, since the
//! visible taxonomy may differ per identity.

use crate::client::DamApi;
use crate::error::{AuthError, RemoteError};
use crate::models::{Session, SessionCredential};
use crate::services::taxonomy_cache::TaxonomyCache;
use chrono::{DateTime, Utc};
use dam_common::events::{EventBus, TaggingEvent};
use dam_common::ConfigStore;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct SessionManager {
    api: Arc<dyn DamApi>,
    config: Arc<dyn ConfigStore>,
    taxonomy: Arc<TaxonomyCache>,
    /// At most one live session; the lock also serializes logins
    session: Mutex<Option<Session>>,
    event_bus: Option<EventBus>,
}

impl SessionManager {
    pub fn new(
        api: Arc<dyn DamApi>,
        config: Arc<dyn ConfigStore>,
        taxonomy: Arc<TaxonomyCache>,
    ) -> Self {
        Self {
            api,
            config,
            taxonomy,
            session: Mutex::new(None),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn api(&self) -> &Arc<dyn DamApi> {
        &self.api
    }

    pub fn taxonomy(&self) -> &Arc<TaxonomyCache> {
        &self.taxonomy
    }

    /// Log in unless a credential is already held
    pub async fn ensure_authenticated(&self) -> Result<(), AuthError> {
        self.credential().await.map(|_| ())
    }

    /// Current credential, logging in first if needed
    pub async fn credential(&self) -> Result<SessionCredential, AuthError> {
        let credential = {
            let mut session = self.session.lock().await;
            if let Some(existing) = session.as_ref() {
                return Ok(existing.credential.clone());
            }

            let credentials = self.config.credentials().ok_or_else(|| {
                warn!("DAM login skipped: no credentials configured");
                AuthError::new("No DAM credentials configured", None)
            })?;

            match self.api.login(&credentials).await {
                Ok(credential) => {
                    *session = Some(Session::new(credential.clone()));
                    info!(identity = %credentials.identity, "DAM session established");
                    if let Some(bus) = &self.event_bus {
                        bus.emit_lossy(TaggingEvent::SessionEstablished {
                            identity: credentials.identity.clone(),
                            timestamp: Utc::now(),
                        });
                    }
                    credential
                }
                Err(e) => {
                    *session = None;
                    warn!(
                        identity = %credentials.identity,
                        remote_status = ?e.remote_status,
                        reason = %e.reason,
                        "DAM login failed"
                    );
                    return Err(e);
                }
            }
        };

        // Outside the session lock: a slow listing must not hold up readers of
        // an already established session.
        if let Err(e) = self.taxonomy.refresh(self.api.as_ref(), &credential).await {
            warn!(
                error = %e,
                "Taxonomy refresh after login failed; resolvers will refresh on demand"
            );
        }

        Ok(credential)
    }

    /// Run a remote operation with the session credential
    ///
    /// If the DAM answers `Unauthorized` while a credential is held, the
    /// session is dropped, a single re-login is attempted and the operation is
    /// retried once. A second rejection is returned to the caller.
    pub async fn with_credential<T, F, Fut>(&self, op: F) -> Result<T, RemoteError>
    where
        F: Fn(SessionCredential) -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let credential = self.credential().await?;

        match op(credential.clone()).await {
            Err(RemoteError::Unauthorized { status, endpoint }) => {
                warn!(
                    status,
                    endpoint = %endpoint,
                    "Session credential rejected; re-authenticating once"
                );
                self.invalidate_if_current(&credential).await;
                let fresh = self.credential().await?;
                op(fresh).await
            }
            other => other,
        }
    }

    /// Drop the session only if it still holds `rejected`
    ///
    /// A concurrent caller may already have replaced it with a fresh one.
    async fn invalidate_if_current(&self, rejected: &SessionCredential) {
        let mut session = self.session.lock().await;
        if session.as_ref().map(|s| &s.credential) == Some(rejected) {
            *session = None;
            debug!("Expired session credential dropped");
            self.emit_invalidated();
        }
    }

    /// Drop the session and the taxonomy tied to it
    pub async fn invalidate(&self) {
        let dropped = self.session.lock().await.take().is_some();
        if dropped {
            info!("DAM session invalidated");
            self.emit_invalidated();
        }
        self.taxonomy.clear().await;
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.lock().await.is_some()
    }

    pub async fn established_at(&self) -> Option<DateTime<Utc>> {
        self.session.lock().await.as_ref().map(|s| s.established_at)
    }

    fn emit_invalidated(&self) {
        if let Some(bus) = &self.event_bus {
            bus.emit_lossy(TaggingEvent::SessionInvalidated {
                timestamp: Utc::now(),
            });
        }
    }
}
