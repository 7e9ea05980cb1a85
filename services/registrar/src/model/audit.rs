//! Audit log entry model.
//!
//! # Purpose
//! Append-only record of enrollment state transitions. Entries are ordered by
//! a store-assigned sequence number; the sequence, not the timestamp, is the
//! ordering contract.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Enrolled,
    Waitlisted,
    Dropped,
    Promoted,
    SectionCreated,
    OverrideRequested,
    OverrideProcessed,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEntry {
    /// Monotonic sequence assigned on append; `0` until persisted.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
    pub action: AuditAction,
    pub course_id: String,
    pub student_id: String,
    /// Snapshot of the subject's placement before the transition
    /// (e.g. `{"section_id": null, "waitlist_position": 1}`).
    #[schema(value_type = Object)]
    pub before: serde_json::Value,
    #[schema(value_type = Object)]
    pub after: serde_json::Value,
}

/// Filter for audit reads; all fields are conjunctive, `None` means
/// unconstrained.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub course_id: Option<String>,
    pub student_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AuditQuery {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(course_id) = &self.course_id {
            if &entry.course_id != course_id {
                return false;
            }
        }
        if let Some(student_id) = &self.student_id {
            if &entry.student_id != student_id {
                return false;
            }
        }
        if let Some(from) = self.from {
            if entry.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.timestamp >= to {
                return false;
            }
        }
        true
    }
}
