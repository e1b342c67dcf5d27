//! Tag assignment orchestration
//!
//! **State machine (per call):**
//! `Unauthenticated → Authenticating → Resolving(i/n) → Assigning → Done | Failed`
//!
//! Tags are resolved one at a time: creating a value needs the guid of a tag
//! that may have been created a moment earlier. A tag that fails to resolve is
//! recorded as skipped and the batch continues. Authentication failure,
//! cancellation and "nothing resolved" end the call in `Failed`.

use crate::error::RemoteError;
use crate::models::{AssignmentSummary, SemanticTag, SkippedTag, TagAssignment};
use crate::services::session_manager::SessionManager;
use crate::services::tag_resolver::TagResolver;
use crate::services::tag_value_resolver::TagValueResolver;
use chrono::Utc;
use dam_common::events::{AssignmentPhase, EventBus, TaggingEvent};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-call state carried explicitly between steps
struct ResolutionRun {
    run_id: Uuid,
    media_id: String,
    phase: AssignmentPhase,
    assignments: Vec<TagAssignment>,
    skipped: Vec<SkippedTag>,
    event_bus: Option<EventBus>,
}

impl ResolutionRun {
    fn new(media_id: &str, event_bus: Option<EventBus>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            media_id: media_id.to_string(),
            phase: AssignmentPhase::Unauthenticated,
            assignments: Vec::new(),
            skipped: Vec::new(),
            event_bus,
        }
    }

    fn transition_to(&mut self, new_phase: AssignmentPhase) {
        let old_phase = self.phase;
        self.phase = new_phase;

        debug!(
            run_id = %self.run_id,
            media_id = %self.media_id,
            from = %old_phase,
            to = %new_phase,
            "Assignment phase changed"
        );

        self.emit(TaggingEvent::AssignmentPhaseChanged {
            run_id: self.run_id,
            media_id: self.media_id.clone(),
            old_phase,
            new_phase,
            timestamp: Utc::now(),
        });
    }

    /// Keep the assignment unless the same pair is already queued
    fn accept(&mut self, assignment: TagAssignment) {
        let duplicate = self.assignments.iter().any(|a| {
            a.tag_id == assignment.tag_id && a.tag_value_id == assignment.tag_value_id
        });
        if duplicate {
            debug!(
                run_id = %self.run_id,
                tag = %assignment.tag_name,
                "Duplicate tag/value pair dropped"
            );
            return;
        }
        self.assignments.push(assignment);
    }

    fn skip(&mut self, name: &str, err: &RemoteError) {
        warn!(
            run_id = %self.run_id,
            media_id = %self.media_id,
            tag = %name,
            error = %err,
            remote_status = ?err.remote_status(),
            "Tag skipped"
        );
        self.emit(TaggingEvent::TagSkipped {
            run_id: self.run_id,
            media_id: self.media_id.clone(),
            tag_name: name.to_string(),
            reason: err.to_string(),
            timestamp: Utc::now(),
        });
        self.skipped.push(SkippedTag {
            name: name.to_string(),
            reason: err.to_string(),
        });
    }

    fn fail<T>(&mut self, err: RemoteError) -> Result<T, RemoteError> {
        self.transition_to(AssignmentPhase::Failed);
        warn!(
            run_id = %self.run_id,
            media_id = %self.media_id,
            error = %err,
            remote_status = ?err.remote_status(),
            "Tag assignment failed"
        );
        self.emit(TaggingEvent::AssignmentFailed {
            run_id: self.run_id,
            media_id: self.media_id.clone(),
            reason: err.to_string(),
            timestamp: Utc::now(),
        });
        Err(err)
    }

    fn emit(&self, event: TaggingEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit_lossy(event);
        }
    }
}

pub struct TagAssignmentOrchestrator {
    session: Arc<SessionManager>,
    tag_resolver: Arc<TagResolver>,
    value_resolver: Arc<TagValueResolver>,
    event_bus: Option<EventBus>,
}

impl TagAssignmentOrchestrator {
    pub fn new(
        session: Arc<SessionManager>,
        tag_resolver: Arc<TagResolver>,
        value_resolver: Arc<TagValueResolver>,
    ) -> Self {
        Self {
            session,
            tag_resolver,
            value_resolver,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Resolve `tags` against the taxonomy and assign them to `media_id`
    ///
    /// `cancel` is checked before every remote step; a call already in flight
    /// is allowed to finish.
    pub async fn assign_tags(
        &self,
        media_id: &str,
        tags: &[SemanticTag],
        cancel: &CancellationToken,
    ) -> Result<AssignmentSummary, RemoteError> {
        let mut run = ResolutionRun::new(media_id, self.event_bus.clone());
        let media_id = media_id.trim();

        if let Err(e) = validate_media_id(media_id) {
            return run.fail(e);
        }
        if tags.is_empty() {
            return run.fail(RemoteError::NothingToAssign {
                media_id: media_id.to_string(),
                skipped: 0,
            });
        }

        info!(
            run_id = %run.run_id,
            media_id = %media_id,
            tag_count = tags.len(),
            "Starting tag assignment"
        );

        if cancel.is_cancelled() {
            return run.fail(RemoteError::Cancelled);
        }
        run.transition_to(AssignmentPhase::Authenticating);
        if let Err(e) = self.session.ensure_authenticated().await {
            return run.fail(e.into());
        }

        let total = tags.len();
        for (index, tag) in tags.iter().enumerate() {
            if cancel.is_cancelled() {
                return run.fail(RemoteError::Cancelled);
            }
            run.transition_to(AssignmentPhase::Resolving {
                index: index + 1,
                total,
            });

            match self.resolve_one(tag, cancel).await {
                Ok(assignment) => run.accept(assignment),
                Err(e) if e.is_fatal_for_batch() => return run.fail(e),
                Err(e) => run.skip(&tag.name, &e),
            }
        }

        if run.assignments.is_empty() {
            let skipped = run.skipped.len();
            return run.fail(RemoteError::NothingToAssign {
                media_id: media_id.to_string(),
                skipped,
            });
        }

        if cancel.is_cancelled() {
            return run.fail(RemoteError::Cancelled);
        }
        run.transition_to(AssignmentPhase::Assigning);

        let api = self.session.api().clone();
        let assignments = run.assignments.clone();
        let owned_media_id = media_id.to_string();
        let sent = self
            .session
            .with_credential(|credential| {
                let api = api.clone();
                let assignments = assignments.clone();
                let media_id = owned_media_id.clone();
                async move { api.assign_tags(&credential, &media_id, &assignments).await }
            })
            .await;

        if let Err(e) = sent {
            let err = if e.is_auth_failure() {
                e
            } else {
                RemoteError::AssignmentFailed {
                    media_id: media_id.to_string(),
                    reason: e.to_string(),
                }
            };
            return run.fail(err);
        }

        run.transition_to(AssignmentPhase::Done);

        let summary = AssignmentSummary {
            media_id: media_id.to_string(),
            assigned_count: run.assignments.len(),
            skipped: run.skipped.clone(),
        };

        info!(
            run_id = %run.run_id,
            media_id = %media_id,
            assigned = summary.assigned_count,
            skipped = summary.skipped.len(),
            "Tag assignment complete"
        );
        run.emit(TaggingEvent::AssignmentCompleted {
            run_id: run.run_id,
            media_id: media_id.to_string(),
            assigned_count: summary.assigned_count,
            skipped_names: summary.skipped_names(),
            timestamp: Utc::now(),
        });

        Ok(summary)
    }

    /// Tag definition, then value; the definition feeds the value step directly
    async fn resolve_one(
        &self,
        tag: &SemanticTag,
        cancel: &CancellationToken,
    ) -> Result<TagAssignment, RemoteError> {
        let definition = self
            .tag_resolver
            .ensure_tag_exists(&tag.name, cancel)
            .await?;
        if !definition.allows_assignment {
            return Err(RemoteError::TagNotAssignable {
                name: definition.name,
            });
        }

        let value = self
            .value_resolver
            .ensure_tag_value_exists(&definition, &tag.value, cancel)
            .await?;

        TagAssignment::from_resolved(&definition, &value, tag.name.trim()).ok_or_else(|| {
            RemoteError::TagNotAssignable {
                name: definition.name.clone(),
            }
        })
    }
}

/// Media ids are substituted into a URL path
fn validate_media_id(media_id: &str) -> Result<(), RemoteError> {
    if media_id.is_empty() {
        return Err(RemoteError::InvalidInput("media id must not be empty".to_string()));
    }
    if media_id
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '%'))
    {
        return Err(RemoteError::InvalidInput(format!(
            "media id '{}' contains characters not allowed in a path segment",
            media_id
        )));
    }
    Ok(())
}
