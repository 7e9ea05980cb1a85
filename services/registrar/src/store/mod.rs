use crate::model::{
    AuditEntry, AuditQuery, Course, EnrollmentPeriod, EnrollmentRecord, OverrideRequest,
    OverrideState, Role, RolePermission, Section, StudentProfile, User, UserPermission,
};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unexpected(err.into())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Unexpected(err.into())
    }
}

/// Persistence boundary for the registrar.
///
/// Single calls are internally consistent; multi-call enrollment transactions
/// are serialized by the engine's per-course lock, so backends do not need
/// cross-call coordination of their own.
#[async_trait]
pub trait RegistrarStore: Send + Sync {
    async fn create_user(&self, user: User) -> StoreResult<User>;
    async fn get_user(&self, user_id: &str) -> StoreResult<User>;
    async fn upsert_student(&self, profile: StudentProfile) -> StoreResult<StudentProfile>;
    async fn get_student(&self, student_id: &str) -> StoreResult<StudentProfile>;

    async fn create_course(&self, course: Course) -> StoreResult<Course>;
    async fn get_course(&self, course_id: &str) -> StoreResult<Course>;

    /// Sections of a course ordered by `section_number` ascending.
    async fn list_sections(&self, course_id: &str) -> StoreResult<Vec<Section>>;
    async fn create_section(&self, section: Section) -> StoreResult<Section>;
    /// Precondition: a free seat exists and the student is not already on the
    /// roster. Violations surface as `Conflict`.
    async fn add_to_roster(&self, section_id: &str, student_id: &str) -> StoreResult<()>;
    async fn remove_from_roster(&self, section_id: &str, student_id: &str) -> StoreResult<()>;

    async fn course_waitlist(&self, course_id: &str) -> StoreResult<Vec<String>>;
    /// Append iff absent; returns the 1-based waitlist position.
    async fn push_course_waitlist(&self, course_id: &str, student_id: &str) -> StoreResult<usize>;
    async fn pop_course_waitlist(&self, course_id: &str) -> StoreResult<Option<String>>;
    async fn remove_from_course_waitlist(
        &self,
        course_id: &str,
        student_id: &str,
    ) -> StoreResult<bool>;

    async fn get_enrollment(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> StoreResult<Option<EnrollmentRecord>>;
    /// Upsert keyed on `(student_id, course_id)`.
    async fn put_enrollment(&self, record: EnrollmentRecord) -> StoreResult<()>;

    async fn list_periods(&self) -> StoreResult<Vec<EnrollmentPeriod>>;
    async fn create_period(&self, period: EnrollmentPeriod) -> StoreResult<EnrollmentPeriod>;
    async fn get_period(&self, period_id: Uuid) -> StoreResult<EnrollmentPeriod>;
    async fn update_period(&self, period: EnrollmentPeriod) -> StoreResult<EnrollmentPeriod>;
    async fn delete_period(&self, period_id: Uuid) -> StoreResult<()>;

    async fn role_permissions(&self, role: Role) -> StoreResult<Vec<RolePermission>>;
    async fn user_permissions(&self, user_id: &str) -> StoreResult<Vec<UserPermission>>;
    async fn grant_user_permission(&self, grant: UserPermission) -> StoreResult<()>;

    async fn create_override(&self, request: OverrideRequest) -> StoreResult<OverrideRequest>;
    async fn get_override(&self, request_id: Uuid) -> StoreResult<OverrideRequest>;
    async fn list_overrides(
        &self,
        state: Option<OverrideState>,
    ) -> StoreResult<Vec<OverrideRequest>>;
    async fn update_override(&self, request: OverrideRequest) -> StoreResult<OverrideRequest>;

    /// Append-only; assigns and returns the entry's sequence number.
    async fn append_audit(&self, entry: AuditEntry) -> StoreResult<u64>;
    async fn query_audit(&self, query: AuditQuery) -> StoreResult<Vec<AuditEntry>>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
