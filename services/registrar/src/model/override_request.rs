//! Admin override request model.
//!
//! # Purpose
//! Represents a queued exceptional-enrollment request and its one-shot
//! pending -> approved/rejected lifecycle.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Which gating check an approved request bypasses. Each request bypasses
/// exactly one gate for exactly one enrollment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKind {
    Prerequisite,
    Capacity,
    Window,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OverrideState {
    Pending,
    Approved,
    Rejected,
}

impl OverrideState {
    pub fn parse(raw: &str) -> Option<OverrideState> {
        match raw {
            "pending" => Some(OverrideState::Pending),
            "approved" => Some(OverrideState::Approved),
            "rejected" => Some(OverrideState::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OverrideRequest {
    pub request_id: Uuid,
    pub student_id: String,
    pub course_id: String,
    pub kind: OverrideKind,
    pub reason: String,
    pub state: OverrideState,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    /// Admin account that processed the request.
    pub processed_by: Option<String>,
    /// Processing notes; on approval the enrollment outcome is appended here.
    pub notes: Option<String>,
}

impl OverrideRequest {
    pub fn is_pending(&self) -> bool {
        self.state == OverrideState::Pending
    }
}
