//! In-memory `DamApi` for unit tests

use crate::client::DamApi;
use crate::error::{AuthError, RemoteError};
use crate::models::{
    MediaPage, MediaQuery, NewTag, NewTagValue, RemoteTagDefinition, RemoteTagValue,
    SessionCredential, TagAssignment,
};
use crate::services::session_manager::SessionManager;
use crate::services::taxonomy_cache::TaxonomyCache;
use async_trait::async_trait;
use dam_common::{Credentials, DamConfig};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Per-endpoint call counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calls {
    pub login: usize,
    pub list_tags: usize,
    pub create_tag: usize,
    pub list_tag_values: usize,
    pub create_tag_value: usize,
    pub search_media: usize,
    pub assign_tags: usize,
}

#[derive(Default)]
struct State {
    calls: Calls,
    next_id: i64,
    logins: usize,
    tags: Vec<RemoteTagDefinition>,
    values: Vec<RemoteTagValue>,
    created_tags: Vec<NewTag>,
    created_values: Vec<NewTagValue>,
    assigned: Vec<(String, Vec<TagAssignment>)>,
    media_page: Option<serde_json::Value>,
    last_query: Option<MediaQuery>,
    fail_login: bool,
    fail_list_tags: bool,
    fail_value_creation: bool,
    fail_assign: bool,
    hide_created_tags: bool,
    failing_tags: HashSet<String>,
    conflicting_tags: HashSet<String>,
    /// value text -> whether the conflicting value shows up in listings
    conflicting_values: HashMap<String, bool>,
    reject_authed: usize,
    cancel_on_list_tags: Option<(usize, CancellationToken)>,
    cancel_on_list_tag_values: Option<CancellationToken>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_tag(&mut self, name: &str, allows_assignment: bool) -> RemoteTagDefinition {
        let id = self.next_id();
        let tag = RemoteTagDefinition {
            id,
            guid: format!("guid-{}", id),
            name: name.to_string(),
            is_multi_value: true,
            is_hierarchical: false,
            allows_assignment,
        };
        self.tags.push(tag.clone());
        tag
    }

    fn insert_value(&mut self, tag_id: i64, text: &str) -> RemoteTagValue {
        let value = RemoteTagValue {
            id: self.next_id(),
            tag_id,
            text: text.to_string(),
            raw_value: text.to_string(),
            has_children: false,
        };
        self.values.push(value.clone());
        value
    }

    /// Authed-call gate: consumes one pending rejection if any
    fn check_authed(&mut self, endpoint: &str) -> Result<(), RemoteError> {
        if self.reject_authed > 0 {
            self.reject_authed -= 1;
            return Err(RemoteError::Unauthorized {
                status: 401,
                endpoint: endpoint.to_string(),
            });
        }
        Ok(())
    }
}

pub struct FakeDam {
    state: Mutex<State>,
}

impl FakeDam {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Calls {
        self.state().calls
    }

    pub fn add_tag(&self, name: &str, allows_assignment: bool) -> RemoteTagDefinition {
        self.state().insert_tag(name, allows_assignment)
    }

    pub fn add_value(&self, tag_id: i64, text: &str) -> RemoteTagValue {
        self.state().insert_value(tag_id, text)
    }

    pub fn tag_guid(&self, name: &str) -> Option<String> {
        self.state()
            .tags
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.guid.clone())
    }

    pub fn set_fail_login(&self, fail: bool) {
        self.state().fail_login = fail;
    }

    pub fn set_fail_list_tags(&self, fail: bool) {
        self.state().fail_list_tags = fail;
    }

    pub fn set_fail_value_creation(&self, fail: bool) {
        self.state().fail_value_creation = fail;
    }

    pub fn set_fail_assign(&self, fail: bool) {
        self.state().fail_assign = fail;
    }

    /// Accept creation of tags but leave them out of listings
    pub fn hide_created_tags(&self, hide: bool) {
        self.state().hide_created_tags = hide;
    }

    /// Creating `name` answers HTTP 500
    pub fn fail_tag_creation(&self, name: &str) {
        self.state().failing_tags.insert(name.to_string());
    }

    /// Creating `name` answers 409 after the tag appears remotely
    pub fn conflict_on_tag_creation(&self, name: &str) {
        self.state().conflicting_tags.insert(name.to_string());
    }

    /// Creating value `text` answers 409; `appears` controls whether the
    /// value is then listed
    pub fn conflict_on_value_creation(&self, text: &str, appears: bool) {
        self.state()
            .conflicting_values
            .insert(text.to_string(), appears);
    }

    /// Cancel `token` while serving the `nth` taxonomy listing
    pub fn cancel_on_list_tags(&self, nth: usize, token: CancellationToken) {
        self.state().cancel_on_list_tags = Some((nth, token));
    }

    /// Cancel `token` while serving the next value lookup
    pub fn cancel_on_list_tag_values(&self, token: CancellationToken) {
        self.state().cancel_on_list_tag_values = Some(token);
    }

    pub fn reject_next_authed_calls(&self, count: usize) {
        self.state().reject_authed = count;
    }

    pub fn created_tags(&self) -> Vec<NewTag> {
        self.state().created_tags.clone()
    }

    pub fn created_values(&self) -> Vec<NewTagValue> {
        self.state().created_values.clone()
    }

    pub fn assigned(&self) -> Vec<(String, Vec<TagAssignment>)> {
        self.state().assigned.clone()
    }

    pub fn set_media_page(&self, page: serde_json::Value) {
        self.state().media_page = Some(page);
    }

    pub fn last_query(&self) -> Option<MediaQuery> {
        self.state().last_query.clone()
    }
}

#[async_trait]
impl DamApi for FakeDam {
    async fn login(&self, credentials: &Credentials) -> Result<SessionCredential, AuthError> {
        let mut state = self.state();
        state.calls.login += 1;
        if state.fail_login {
            return Err(AuthError::new(
                format!("login rejected for {}", credentials.identity),
                Some(401),
            ));
        }
        state.logins += 1;
        Ok(SessionCredential::new(format!("session-{}", state.logins)))
    }

    async fn list_tags(
        &self,
        _credential: &SessionCredential,
    ) -> Result<Vec<RemoteTagDefinition>, RemoteError> {
        let mut state = self.state();
        state.calls.list_tags += 1;
        if let Some((nth, token)) = &state.cancel_on_list_tags {
            if state.calls.list_tags == *nth {
                token.cancel();
            }
        }
        state.check_authed("/tags")?;
        if state.fail_list_tags {
            return Err(RemoteError::Status {
                status: 503,
                endpoint: "/tags".to_string(),
            });
        }
        Ok(state.tags.clone())
    }

    async fn create_tag(
        &self,
        _credential: &SessionCredential,
        tag: &NewTag,
    ) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.calls.create_tag += 1;
        state.check_authed("/tags/create")?;
        state.created_tags.push(tag.clone());

        if state.failing_tags.contains(&tag.name) {
            return Err(RemoteError::Status {
                status: 500,
                endpoint: "/tags/create".to_string(),
            });
        }
        if state.conflicting_tags.contains(&tag.name) {
            state.insert_tag(&tag.name, true);
            return Err(RemoteError::Conflict {
                endpoint: "/tags/create".to_string(),
            });
        }
        if !state.hide_created_tags {
            state.insert_tag(&tag.name, true);
        }
        Ok(())
    }

    async fn list_tag_values(
        &self,
        _credential: &SessionCredential,
        tag_id: i64,
        filter: &str,
    ) -> Result<Vec<RemoteTagValue>, RemoteError> {
        let mut state = self.state();
        state.calls.list_tag_values += 1;
        if let Some(token) = state.cancel_on_list_tag_values.take() {
            token.cancel();
        }
        state.check_authed("/tagValues")?;
        let filter = filter.to_lowercase();
        Ok(state
            .values
            .iter()
            .filter(|v| v.tag_id == tag_id && v.text.to_lowercase().contains(&filter))
            .cloned()
            .collect())
    }

    async fn create_tag_value(
        &self,
        _credential: &SessionCredential,
        value: &NewTagValue,
    ) -> Result<RemoteTagValue, RemoteError> {
        let mut state = self.state();
        state.calls.create_tag_value += 1;
        state.check_authed("/tagValues/create")?;
        state.created_values.push(value.clone());

        if state.fail_value_creation {
            return Err(RemoteError::Status {
                status: 500,
                endpoint: "/tagValues/create".to_string(),
            });
        }
        let tag_id = state
            .tags
            .iter()
            .find(|t| t.guid == value.tag_guid)
            .map(|t| t.id)
            .ok_or_else(|| RemoteError::Status {
                status: 404,
                endpoint: "/tagValues/create".to_string(),
            })?;
        if let Some(appears) = state.conflicting_values.get(&value.value).copied() {
            if appears {
                state.insert_value(tag_id, &value.value);
            }
            return Err(RemoteError::Conflict {
                endpoint: "/tagValues/create".to_string(),
            });
        }
        Ok(state.insert_value(tag_id, &value.value))
    }

    async fn search_media(
        &self,
        _credential: &SessionCredential,
        query: &MediaQuery,
    ) -> Result<MediaPage, RemoteError> {
        let mut state = self.state();
        state.calls.search_media += 1;
        state.check_authed("/media")?;
        state.last_query = Some(query.clone());
        match &state.media_page {
            Some(page) => serde_json::from_value(page.clone()).map_err(|e| RemoteError::Parse {
                endpoint: "/media".to_string(),
                reason: e.to_string(),
            }),
            None => Ok(MediaPage {
                success: true,
                ..MediaPage::default()
            }),
        }
    }

    async fn assign_tags(
        &self,
        _credential: &SessionCredential,
        media_id: &str,
        assignments: &[TagAssignment],
    ) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.calls.assign_tags += 1;
        state.check_authed("assignment")?;
        if state.fail_assign {
            return Err(RemoteError::Status {
                status: 500,
                endpoint: format!("/media/{}/tags", media_id),
            });
        }
        state
            .assigned
            .push((media_id.to_string(), assignments.to_vec()));
        Ok(())
    }
}

/// Session over `fake` with test credentials and an empty taxonomy
pub fn session_for(fake: &Arc<FakeDam>) -> Arc<SessionManager> {
    let config = DamConfig::new("http://fake.test").with_credentials("svc", "pw");
    Arc::new(SessionManager::new(
        fake.clone(),
        Arc::new(config),
        Arc::new(TaxonomyCache::new()),
    ))
}
