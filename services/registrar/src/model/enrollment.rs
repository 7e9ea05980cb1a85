//! Enrollment records, enrollment periods, and the window gate verdict.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Waitlisted,
    Completed,
    Dropped,
}

impl EnrollmentStatus {
    /// Whether the record still occupies a seat or waitlist slot. Completed
    /// and dropped rows are historical and never block a re-enroll.
    pub fn is_live(&self) -> bool {
        matches!(self, EnrollmentStatus::Active | EnrollmentStatus::Waitlisted)
    }
}

/// One student's relationship to one course. Unique on
/// `(student_id, course_id)` while the status is live; historical rows are
/// kept for audit and prerequisite evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentRecord {
    pub student_id: String,
    pub course_id: String,
    /// Non-null exactly when `status == Active`.
    pub section_id: Option<String>,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Predicate selecting which students an enrollment period applies to.
/// An empty predicate matches every student.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StudentGroup {
    /// Degree programs admitted by this period; empty means all programs.
    #[serde(default)]
    pub degree_programs: Vec<String>,
}

impl StudentGroup {
    pub fn matches(&self, degree_program: &str) -> bool {
        self.degree_programs.is_empty()
            || self.degree_programs.iter().any(|p| p == degree_program)
    }
}

/// A time window within which students may self-enroll.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentPeriod {
    pub period_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub group: StudentGroup,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// If set, instants before this point inside the window count as the
    /// priority phase. Must lie within `[start, end]`.
    pub priority_end: Option<DateTime<Utc>>,
    pub active: bool,
}

impl EnrollmentPeriod {
    /// Structural validation applied at the API edge before persisting.
    pub fn validate(&self) -> Result<(), String> {
        if self.start >= self.end {
            return Err("period start must precede end".to_string());
        }
        if let Some(priority_end) = self.priority_end {
            if priority_end < self.start || priority_end > self.end {
                return Err("priority_end must lie within [start, end]".to_string());
            }
        }
        Ok(())
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Verdict of the enrollment window gate. Anything other than `InPriority`
/// or `InGeneral` means the window is closed for the caller; the
/// before/after/inactive split is advisory for error messages only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    InPriority,
    InGeneral,
    ClosedBefore,
    ClosedAfter,
    Inactive,
}

impl WindowStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, WindowStatus::InPriority | WindowStatus::InGeneral)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn instant(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, hour, 0, 0).unwrap()
    }

    fn period() -> EnrollmentPeriod {
        EnrollmentPeriod {
            period_id: Uuid::new_v4(),
            name: "Spring registration".to_string(),
            group: StudentGroup::default(),
            start: instant(8),
            end: instant(18),
            priority_end: Some(instant(10)),
            active: true,
        }
    }

    #[test]
    fn validation_rejects_inverted_windows() {
        let mut p = period();
        p.end = p.start;
        assert!(p.validate().is_err());

        let mut p = period();
        p.priority_end = Some(instant(20));
        assert!(p.validate().is_err());

        assert!(period().validate().is_ok());
    }

    #[test]
    fn window_containment_is_half_open() {
        let p = period();
        assert!(!p.contains(instant(7)));
        assert!(p.contains(instant(8)));
        assert!(p.contains(instant(17)));
        assert!(!p.contains(instant(18)));
    }

    #[test]
    fn empty_group_matches_everyone() {
        assert!(StudentGroup::default().matches("Physics"));
        let scoped = StudentGroup {
            degree_programs: vec!["Computer Science".to_string()],
        };
        assert!(scoped.matches("Computer Science"));
        assert!(!scoped.matches("Physics"));
    }
}
