//! Data models for dam-tagger
//!
//! - Wire types for the DAM REST API
//! - Session credential
//! - Domain image projection
//! - Assignment inputs/outputs

pub mod assignment;
pub mod domain_image;
pub mod remote;
pub mod session;

pub use assignment::{AssignmentReport, AssignmentSummary, SemanticTag, SkippedTag, TagAssignment};
pub use domain_image::{DomainImage, ImageTag, TagOrigin};
pub use remote::{
    AssignmentBody, AssignmentPair, ListEnvelope, MediaPage, MediaQuery, NewTag, NewTagValue,
    RawMediaRecord, RawTag, RemoteTagDefinition, RemoteTagValue,
};
pub use session::{Session, SessionCredential};
