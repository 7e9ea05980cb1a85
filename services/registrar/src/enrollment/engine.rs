//! Enrollment engine.
//!
//! # Purpose
//! Orchestrates enroll/drop/bulk requests: validates the caller's student and
//! course, gates on the enrollment window, then places the student in a seat
//! or on the course waitlist under the per-course lock. Seat releases trigger
//! FIFO waitlist promotion inside the same transaction.
//!
//! # Key invariants
//! - Every roster/waitlist read that feeds a mutation happens with the course
//!   lock held; no seat is visible-open between a drop and its promotion.
//! - Counters are never stored: occupancy is derived from the ordered roster.
//! - A full course yields `Waitlisted(position)`, never `CapacityExceeded`,
//!   unless a capacity override was explicitly requested and allocation failed.
use anyhow::anyhow;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::enrollment::locks::CourseLocks;
use crate::enrollment::{sections, window};
use crate::model::{
    AuditAction, AuditEntry, Course, EnrollmentRecord, EnrollmentStatus, OverrideKind, Section,
    StudentProfile, UserStatus,
};
use crate::store::{RegistrarStore, StoreError};

/// Gates disabled for one enrollment attempt, granted through the override
/// workflow. `OverrideKind::Other` maps to the empty set.
pub type OverrideSet = HashSet<OverrideKind>;

/// Build the gate set an approved override request disables.
pub fn override_gates(kind: OverrideKind) -> OverrideSet {
    match kind {
        OverrideKind::Other => OverrideSet::new(),
        kind => OverrideSet::from([kind]),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollOutcome {
    Enrolled {
        section_id: String,
        section_number: u32,
    },
    Waitlisted {
        position: usize,
    },
}

#[derive(Debug, Error)]
pub enum EnrollError {
    #[error("student not found")]
    UnknownStudent,
    #[error("student account is suspended")]
    StudentSuspended,
    #[error("course not found")]
    UnknownCourse,
    #[error("student is already enrolled or waitlisted for this course")]
    AlreadyEnrolled,
    #[error("student is not enrolled in this course")]
    NotEnrolled,
    #[error("no enrollment period is currently open for the caller")]
    WindowClosed,
    #[error("missing prerequisites: {}", .0.join(", "))]
    PrerequisiteMissing(Vec<String>),
    #[error("capacity exceeded and no overflow section could be allocated")]
    CapacityExceeded,
    #[error("course is archived and not accepting changes")]
    CourseArchived,
    #[error("course is busy; retry")]
    ServiceBusy,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EnrollError {
    /// Stable machine-readable code carried in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            EnrollError::UnknownStudent => "unknown_student",
            EnrollError::StudentSuspended => "student_suspended",
            EnrollError::UnknownCourse => "unknown_course",
            EnrollError::AlreadyEnrolled => "already_enrolled",
            EnrollError::NotEnrolled => "not_enrolled",
            EnrollError::WindowClosed => "window_closed",
            EnrollError::PrerequisiteMissing(_) => "prerequisite_missing",
            EnrollError::CapacityExceeded => "capacity_exceeded",
            EnrollError::CourseArchived => "course_archived",
            EnrollError::ServiceBusy => "service_busy",
            EnrollError::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for EnrollError {
    fn from(err: StoreError) -> Self {
        EnrollError::Internal(anyhow!(err))
    }
}

/// Per-student outcome partitions of a bulk enrollment, each preserving the
/// input order.
#[derive(Debug, Default)]
pub struct BulkEnrollOutcome {
    pub enrolled: Vec<(String, String)>,
    pub waitlisted: Vec<(String, usize)>,
    pub errored: Vec<(String, &'static str)>,
}

pub struct EnrollmentEngine {
    store: Arc<dyn RegistrarStore>,
    locks: CourseLocks,
}

impl EnrollmentEngine {
    pub fn new(store: Arc<dyn RegistrarStore>, lock_timeout: Duration) -> Self {
        Self {
            store,
            locks: CourseLocks::new(lock_timeout),
        }
    }

    /// Enroll `student_id` into `course_id`, bypassing the gates named in
    /// `overrides`.
    ///
    /// Pre-checks run in a fixed order and short-circuit: student standing,
    /// enrollment window, course availability, duplicate enrollment, then
    /// prerequisites. The duplicate check onward runs under the course lock
    /// so concurrent requests against the same course serialize.
    pub async fn enroll(
        &self,
        actor_id: &str,
        student_id: &str,
        course_id: &str,
        overrides: &OverrideSet,
    ) -> Result<EnrollOutcome, EnrollError> {
        let student = match self.store.get_student(student_id).await {
            Ok(profile) => profile,
            Err(StoreError::NotFound(_)) => return Err(EnrollError::UnknownStudent),
            Err(err) => return Err(err.into()),
        };
        let account = match self.store.get_user(&student.user_id).await {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => return Err(EnrollError::UnknownStudent),
            Err(err) => return Err(err.into()),
        };
        if account.status == UserStatus::Suspended {
            return Err(EnrollError::StudentSuspended);
        }

        if !overrides.contains(&OverrideKind::Window) {
            let periods = self.store.list_periods().await?;
            let verdict = window::check_window(&periods, &student.degree_program, Utc::now());
            if !verdict.is_open() {
                return Err(EnrollError::WindowClosed);
            }
        }

        let course = match self.store.get_course(course_id).await {
            Ok(course) => course,
            Err(StoreError::NotFound(_)) => return Err(EnrollError::UnknownCourse),
            Err(err) => return Err(err.into()),
        };
        if course.is_archived() {
            return Err(EnrollError::CourseArchived);
        }

        let _guard = self
            .locks
            .acquire(course_id)
            .await
            .map_err(|_| EnrollError::ServiceBusy)?;

        if let Some(existing) = self.store.get_enrollment(student_id, course_id).await? {
            if existing.status.is_live() {
                return Err(EnrollError::AlreadyEnrolled);
            }
        }

        if !overrides.contains(&OverrideKind::Prerequisite) {
            let mut missing: Vec<String> = course
                .prerequisites
                .iter()
                .filter(|prereq| !student.completed_courses.contains(prereq))
                .cloned()
                .collect();
            if !missing.is_empty() {
                missing.sort();
                return Err(EnrollError::PrerequisiteMissing(missing));
            }
        }

        match sections::find_open_section(self.store.as_ref(), course_id).await? {
            Some(section) => self.seat(actor_id, &student, section).await,
            None if overrides.contains(&OverrideKind::Capacity) => {
                let section = self.allocate_section(actor_id, &course).await.map_err(
                    |err| match err {
                        EnrollError::Internal(inner) => {
                            tracing::warn!(error = ?inner, %course_id, "overflow allocation failed");
                            EnrollError::CapacityExceeded
                        }
                        other => other,
                    },
                )?;
                self.seat(actor_id, &student, section).await
            }
            None => {
                let existing = self.store.list_sections(course_id).await?;
                if existing.is_empty() {
                    // A course gains its first section lazily so every active
                    // enrollment references a section.
                    let section = self.allocate_section(actor_id, &course).await?;
                    self.seat(actor_id, &student, section).await
                } else {
                    self.waitlist(actor_id, &student, course_id).await
                }
            }
        }
    }

    /// Drop `student_id` from `course_id`, releasing the seat or waitlist
    /// slot and promoting the waitlist head into any freed seat within the
    /// same transaction.
    pub async fn drop(
        &self,
        actor_id: &str,
        student_id: &str,
        course_id: &str,
    ) -> Result<(), EnrollError> {
        let _guard = self
            .locks
            .acquire(course_id)
            .await
            .map_err(|_| EnrollError::ServiceBusy)?;

        let Some(record) = self.store.get_enrollment(student_id, course_id).await? else {
            return Err(EnrollError::NotEnrolled);
        };
        match record.status {
            EnrollmentStatus::Active => {
                let section_id = record
                    .section_id
                    .clone()
                    .ok_or_else(|| anyhow!("active enrollment has no section"))?;
                self.store.remove_from_roster(&section_id, student_id).await?;
                self.mark_dropped(record).await?;
                self.audit(
                    actor_id,
                    AuditAction::Dropped,
                    course_id,
                    student_id,
                    serde_json::json!({ "section_id": section_id }),
                    serde_json::Value::Null,
                )
                .await?;
                metrics::counter!("registrar_drops_total").increment(1);
                // Promotion failures must not fail the drop; the next seat
                // release will retry.
                if let Err(err) = self.promote_waitlist(actor_id, course_id).await {
                    tracing::warn!(error = ?err, %course_id, "waitlist promotion failed after drop");
                }
            }
            EnrollmentStatus::Waitlisted => {
                self.store
                    .remove_from_course_waitlist(course_id, student_id)
                    .await?;
                self.mark_dropped(record).await?;
                self.audit(
                    actor_id,
                    AuditAction::Dropped,
                    course_id,
                    student_id,
                    serde_json::json!({ "waitlisted": true }),
                    serde_json::Value::Null,
                )
                .await?;
                metrics::counter!("registrar_drops_total").increment(1);
            }
            EnrollmentStatus::Completed | EnrollmentStatus::Dropped => {
                return Err(EnrollError::NotEnrolled);
            }
        }
        Ok(())
    }

    /// Enroll each student in order, taking and releasing the course lock per
    /// student to bound critical-section length.
    pub async fn bulk_enroll(
        &self,
        actor_id: &str,
        course_id: &str,
        student_ids: &[String],
        overrides: &OverrideSet,
    ) -> BulkEnrollOutcome {
        let mut outcome = BulkEnrollOutcome::default();
        for student_id in student_ids {
            match self.enroll(actor_id, student_id, course_id, overrides).await {
                Ok(EnrollOutcome::Enrolled { section_id, .. }) => {
                    outcome.enrolled.push((student_id.clone(), section_id));
                }
                Ok(EnrollOutcome::Waitlisted { position }) => {
                    outcome.waitlisted.push((student_id.clone(), position));
                }
                Err(err) => {
                    outcome.errored.push((student_id.clone(), err.code()));
                }
            }
        }
        outcome
    }

    /// Promote course-waitlist heads into open seats until either runs out.
    ///
    /// Must be called with the course lock held. The section chosen is always
    /// the lowest-numbered one with a free seat at the moment of promotion,
    /// and the waitlist is consumed strictly in FIFO order.
    pub(crate) async fn promote_waitlist(
        &self,
        actor_id: &str,
        course_id: &str,
    ) -> Result<u32, EnrollError> {
        let mut promoted = 0;
        loop {
            let Some(section) = sections::find_open_section(self.store.as_ref(), course_id).await?
            else {
                break;
            };
            let waitlist = self.store.course_waitlist(course_id).await?;
            let Some(head) = waitlist.first().cloned() else {
                break;
            };
            // Seat first, then unlink from the waitlist: if seating fails the
            // waitlist is untouched and a later trigger retries.
            self.store.add_to_roster(&section.section_id, &head).await?;
            self.store
                .remove_from_course_waitlist(course_id, &head)
                .await?;
            let now = Utc::now();
            let record = self.store.get_enrollment(&head, course_id).await?;
            let enrolled_at = record.as_ref().map(|r| r.enrolled_at).unwrap_or(now);
            self.store
                .put_enrollment(EnrollmentRecord {
                    student_id: head.clone(),
                    course_id: course_id.to_string(),
                    section_id: Some(section.section_id.clone()),
                    status: EnrollmentStatus::Active,
                    enrolled_at,
                    updated_at: now,
                })
                .await?;
            self.audit(
                actor_id,
                AuditAction::Promoted,
                course_id,
                &head,
                serde_json::json!({ "waitlist_position": 1 }),
                serde_json::json!({ "section_id": section.section_id }),
            )
            .await?;
            metrics::counter!("registrar_promotions_total").increment(1);
            promoted += 1;
        }
        Ok(promoted)
    }

    async fn allocate_section(
        &self,
        actor_id: &str,
        course: &Course,
    ) -> Result<Section, EnrollError> {
        let section = sections::create_overflow_section(self.store.as_ref(), course).await?;
        self.audit(
            actor_id,
            AuditAction::SectionCreated,
            &course.course_id,
            "",
            serde_json::Value::Null,
            serde_json::json!({
                "section_id": section.section_id,
                "section_number": section.section_number,
            }),
        )
        .await?;
        Ok(section)
    }

    async fn seat(
        &self,
        actor_id: &str,
        student: &StudentProfile,
        section: Section,
    ) -> Result<EnrollOutcome, EnrollError> {
        self.store
            .add_to_roster(&section.section_id, &student.student_id)
            .await?;
        let now = Utc::now();
        self.store
            .put_enrollment(EnrollmentRecord {
                student_id: student.student_id.clone(),
                course_id: section.course_id.clone(),
                section_id: Some(section.section_id.clone()),
                status: EnrollmentStatus::Active,
                enrolled_at: now,
                updated_at: now,
            })
            .await?;
        self.audit(
            actor_id,
            AuditAction::Enrolled,
            &section.course_id,
            &student.student_id,
            serde_json::Value::Null,
            serde_json::json!({ "section_id": section.section_id }),
        )
        .await?;
        metrics::counter!("registrar_enrollments_total", "outcome" => "enrolled").increment(1);
        Ok(EnrollOutcome::Enrolled {
            section_id: section.section_id,
            section_number: section.section_number,
        })
    }

    async fn waitlist(
        &self,
        actor_id: &str,
        student: &StudentProfile,
        course_id: &str,
    ) -> Result<EnrollOutcome, EnrollError> {
        let position = self
            .store
            .push_course_waitlist(course_id, &student.student_id)
            .await?;
        let now = Utc::now();
        self.store
            .put_enrollment(EnrollmentRecord {
                student_id: student.student_id.clone(),
                course_id: course_id.to_string(),
                section_id: None,
                status: EnrollmentStatus::Waitlisted,
                enrolled_at: now,
                updated_at: now,
            })
            .await?;
        self.audit(
            actor_id,
            AuditAction::Waitlisted,
            course_id,
            &student.student_id,
            serde_json::Value::Null,
            serde_json::json!({ "waitlist_position": position }),
        )
        .await?;
        metrics::counter!("registrar_enrollments_total", "outcome" => "waitlisted").increment(1);
        Ok(EnrollOutcome::Waitlisted { position })
    }

    async fn mark_dropped(&self, record: EnrollmentRecord) -> Result<(), EnrollError> {
        self.store
            .put_enrollment(EnrollmentRecord {
                section_id: None,
                status: EnrollmentStatus::Dropped,
                updated_at: Utc::now(),
                ..record
            })
            .await?;
        Ok(())
    }

    async fn audit(
        &self,
        actor_id: &str,
        action: AuditAction,
        course_id: &str,
        student_id: &str,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> Result<(), EnrollError> {
        self.store
            .append_audit(AuditEntry {
                seq: 0,
                timestamp: Utc::now(),
                actor_id: actor_id.to_string(),
                action,
                course_id: course_id.to_string(),
                student_id: student_id.to_string(),
                before,
                after,
            })
            .await?;
        Ok(())
    }
}
