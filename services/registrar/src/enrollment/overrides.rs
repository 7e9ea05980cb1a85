//! Admin override workflow.
//!
//! # Purpose
//! Queue of exceptional enrollment requests with a one-shot
//! pending -> approved/rejected lifecycle. Approval immediately re-invokes the
//! enrollment engine with the request's gate disabled and records the outcome
//! in the request notes; each request is independent and never re-approves a
//! later identical request.
use anyhow::anyhow;
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::enrollment::engine::{override_gates, EnrollOutcome, EnrollmentEngine};
use crate::model::{
    AuditAction, AuditEntry, OverrideKind, OverrideRequest, OverrideState,
};
use crate::store::{RegistrarStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideDecision {
    Approve,
    Reject,
}

impl OverrideDecision {
    pub fn parse(raw: &str) -> Option<OverrideDecision> {
        match raw {
            "approve" => Some(OverrideDecision::Approve),
            "reject" => Some(OverrideDecision::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum OverrideError {
    #[error("override request not found")]
    NotFound,
    #[error("override request was already processed")]
    AlreadyProcessed,
    #[error("student not found")]
    UnknownStudent,
    #[error("course not found")]
    UnknownCourse,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for OverrideError {
    fn from(err: StoreError) -> Self {
        OverrideError::Internal(anyhow!(err))
    }
}

/// Create a pending override request after validating its subjects exist.
pub async fn create_request(
    store: &dyn RegistrarStore,
    actor_id: &str,
    student_id: &str,
    course_id: &str,
    kind: OverrideKind,
    reason: String,
) -> Result<OverrideRequest, OverrideError> {
    if let Err(err) = store.get_student(student_id).await {
        return Err(match err {
            StoreError::NotFound(_) => OverrideError::UnknownStudent,
            other => other.into(),
        });
    }
    if let Err(err) = store.get_course(course_id).await {
        return Err(match err {
            StoreError::NotFound(_) => OverrideError::UnknownCourse,
            other => other.into(),
        });
    }

    let request = store
        .create_override(OverrideRequest {
            request_id: Uuid::new_v4(),
            student_id: student_id.to_string(),
            course_id: course_id.to_string(),
            kind,
            reason,
            state: OverrideState::Pending,
            requested_at: Utc::now(),
            processed_at: None,
            processed_by: None,
            notes: None,
        })
        .await?;
    store
        .append_audit(AuditEntry {
            seq: 0,
            timestamp: Utc::now(),
            actor_id: actor_id.to_string(),
            action: AuditAction::OverrideRequested,
            course_id: course_id.to_string(),
            student_id: student_id.to_string(),
            before: serde_json::Value::Null,
            after: serde_json::json!({
                "request_id": request.request_id,
                "kind": request.kind,
            }),
        })
        .await?;
    Ok(request)
}

/// Process a pending request exactly once.
///
/// On approval the engine runs with the request's gate disabled; the
/// enrollment outcome (or its error code) is appended to the notes so the
/// decision trail survives even when the bypassed enrollment still fails.
pub async fn process_request(
    store: &dyn RegistrarStore,
    engine: &EnrollmentEngine,
    actor_id: &str,
    request_id: Uuid,
    decision: OverrideDecision,
    notes: Option<String>,
) -> Result<OverrideRequest, OverrideError> {
    let request = match store.get_override(request_id).await {
        Ok(request) => request,
        Err(StoreError::NotFound(_)) => return Err(OverrideError::NotFound),
        Err(err) => return Err(err.into()),
    };
    if !request.is_pending() {
        return Err(OverrideError::AlreadyProcessed);
    }

    let mut processed = request.clone();
    processed.processed_at = Some(Utc::now());
    processed.processed_by = Some(actor_id.to_string());
    let mut note_lines: Vec<String> = notes.into_iter().collect();

    match decision {
        OverrideDecision::Reject => {
            processed.state = OverrideState::Rejected;
        }
        OverrideDecision::Approve => {
            processed.state = OverrideState::Approved;
            let outcome = engine
                .enroll(
                    actor_id,
                    &request.student_id,
                    &request.course_id,
                    &override_gates(request.kind),
                )
                .await;
            note_lines.push(match outcome {
                Ok(EnrollOutcome::Enrolled { section_id, .. }) => {
                    format!("enrolled into {section_id}")
                }
                Ok(EnrollOutcome::Waitlisted { position }) => {
                    format!("waitlisted at position {position}")
                }
                Err(err) => format!("enrollment failed: {}", err.code()),
            });
        }
    }
    if !note_lines.is_empty() {
        processed.notes = Some(note_lines.join("; "));
    }

    let updated = store.update_override(processed).await?;
    store
        .append_audit(AuditEntry {
            seq: 0,
            timestamp: Utc::now(),
            actor_id: actor_id.to_string(),
            action: AuditAction::OverrideProcessed,
            course_id: updated.course_id.clone(),
            student_id: updated.student_id.clone(),
            before: serde_json::json!({ "state": OverrideState::Pending }),
            after: serde_json::json!({
                "request_id": updated.request_id,
                "state": updated.state,
            }),
        })
        .await?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Course, EnrollmentPeriod, Role, StudentGroup, StudentProfile, User, UserStatus,
    };
    use crate::store::memory::InMemoryStore;
    use chrono::Duration as ChronoDuration;
    use std::sync::Arc;
    use std::time::Duration;

    const ACTOR: &str = "admin-1";

    async fn fixture() -> (Arc<InMemoryStore>, EnrollmentEngine) {
        let store = Arc::new(InMemoryStore::new());
        let now = Utc::now();
        store
            .create_period(EnrollmentPeriod {
                period_id: Uuid::new_v4(),
                name: "open".to_string(),
                group: StudentGroup::default(),
                start: now - ChronoDuration::hours(1),
                end: now + ChronoDuration::hours(1),
                priority_end: None,
                active: true,
            })
            .await
            .expect("period");
        store
            .create_user(User {
                user_id: "u-STU-Y".to_string(),
                display_name: "STU-Y".to_string(),
                email: "stu-y@campus.test".to_string(),
                role: Role::Student,
                status: UserStatus::Active,
                attributes: Default::default(),
            })
            .await
            .expect("user");
        store
            .upsert_student(StudentProfile {
                student_id: "STU-Y".to_string(),
                user_id: "u-STU-Y".to_string(),
                degree_program: "Computer Science".to_string(),
                academic_standing: "good".to_string(),
                gpa: 3.2,
                completed_courses: vec![],
            })
            .await
            .expect("student");
        store
            .create_course(Course {
                course_id: "c2".to_string(),
                code: "C2".to_string(),
                name: "Course".to_string(),
                department: "Computer Science".to_string(),
                credits: 3,
                default_enrollment_limit: 1,
                start_date: None,
                end_date: None,
                prerequisites: vec![],
                archived: false,
                description: String::new(),
            })
            .await
            .expect("course");
        let engine = EnrollmentEngine::new(store.clone(), Duration::from_secs(1));
        (store, engine)
    }

    #[tokio::test]
    async fn approve_runs_the_engine_and_records_the_outcome() {
        let (store, engine) = fixture().await;
        let request = create_request(
            store.as_ref(),
            ACTOR,
            "STU-Y",
            "c2",
            OverrideKind::Capacity,
            "lab requirement".to_string(),
        )
        .await
        .expect("request");

        let processed = process_request(
            store.as_ref(),
            &engine,
            ACTOR,
            request.request_id,
            OverrideDecision::Approve,
            None,
        )
        .await
        .expect("approve");
        assert_eq!(processed.state, OverrideState::Approved);
        assert_eq!(processed.processed_by.as_deref(), Some(ACTOR));
        assert_eq!(processed.notes.as_deref(), Some("enrolled into c2-s1"));

        let record = store
            .get_enrollment("STU-Y", "c2")
            .await
            .expect("record")
            .expect("exists");
        assert_eq!(record.section_id.as_deref(), Some("c2-s1"));
    }

    #[tokio::test]
    async fn processing_is_one_shot() {
        let (store, engine) = fixture().await;
        let request = create_request(
            store.as_ref(),
            ACTOR,
            "STU-Y",
            "c2",
            OverrideKind::Window,
            "makeup term".to_string(),
        )
        .await
        .expect("request");

        process_request(
            store.as_ref(),
            &engine,
            ACTOR,
            request.request_id,
            OverrideDecision::Reject,
            Some("insufficient justification".to_string()),
        )
        .await
        .expect("reject");

        let err = process_request(
            store.as_ref(),
            &engine,
            ACTOR,
            request.request_id,
            OverrideDecision::Approve,
            None,
        )
        .await
        .expect_err("second process");
        assert!(matches!(err, OverrideError::AlreadyProcessed));

        // Rejection never touched enrollment state.
        assert!(store
            .get_enrollment("STU-Y", "c2")
            .await
            .expect("record")
            .is_none());
    }

    #[tokio::test]
    async fn create_validates_subjects() {
        let (store, _engine) = fixture().await;
        let err = create_request(
            store.as_ref(),
            ACTOR,
            "STU-GHOST",
            "c2",
            OverrideKind::Capacity,
            "x".to_string(),
        )
        .await
        .expect_err("unknown student");
        assert!(matches!(err, OverrideError::UnknownStudent));

        let err = create_request(
            store.as_ref(),
            ACTOR,
            "STU-Y",
            "c-none",
            OverrideKind::Capacity,
            "x".to_string(),
        )
        .await
        .expect_err("unknown course");
        assert!(matches!(err, OverrideError::UnknownCourse));
    }
}
