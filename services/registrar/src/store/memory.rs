//! In-memory implementation of the registrar store.
//!
//! # Purpose
//! Implements the `RegistrarStore` trait entirely in memory using `HashMap`s
//! guarded by `tokio::sync::RwLock`. It exists for:
//! - local development and tests (no external dependencies)
//! - deployments where durability is not required
//! - as a fallback when Postgres is not configured
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - **Single-call consistency**: each trait method is atomic with respect to
//!   the structure it touches. Multi-call enrollment transactions are
//!   serialized by the engine's per-course lock, not here.
//!
//! # Audit log
//! The audit log is an append-only `Vec` with a monotonically increasing
//! `seq` assigned by this process. Unlike a change feed it is never evicted:
//! entries are kept for the lifetime of the process.
use super::{RegistrarStore, StoreError, StoreResult};
use crate::auth::permissions::default_role_grants;
use crate::model::{
    AuditEntry, AuditQuery, Course, EnrollmentPeriod, EnrollmentRecord, OverrideRequest,
    OverrideState, Role, RolePermission, Section, StudentProfile, User, UserPermission,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Append-only audit sequence. `next_seq` is assigned by this process and is
/// the total-order contract for readers.
#[derive(Debug, Default)]
struct AuditLog {
    next_seq: u64,
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    fn append(&mut self, mut entry: AuditEntry) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        entry.seq = seq;
        self.entries.push(entry);
        seq
    }
}

/// In-memory registrar store.
///
/// All maps are wrapped in `Arc<RwLock<...>>` so the store can be shared
/// across async request handlers, reads can proceed concurrently, and writes
/// are serialized to preserve invariants.
pub struct InMemoryStore {
    users: Arc<RwLock<HashMap<String, User>>>,
    /// Student profiles keyed by the human-visible student id.
    students: Arc<RwLock<HashMap<String, StudentProfile>>>,
    courses: Arc<RwLock<HashMap<String, Course>>>,
    /// Sections keyed by `section_id`; per-course listings scan and filter.
    sections: Arc<RwLock<HashMap<String, Section>>>,
    /// Ordered course-level waitlists keyed by `course_id`.
    waitlists: Arc<RwLock<HashMap<String, Vec<String>>>>,
    /// Enrollment records keyed by `(student_id, course_id)`.
    enrollments: Arc<RwLock<HashMap<(String, String), EnrollmentRecord>>>,
    periods: Arc<RwLock<HashMap<Uuid, EnrollmentPeriod>>>,
    role_permissions: Arc<RwLock<Vec<RolePermission>>>,
    user_permissions: Arc<RwLock<HashMap<String, Vec<UserPermission>>>>,
    overrides: Arc<RwLock<HashMap<Uuid, OverrideRequest>>>,
    audit: Arc<RwLock<AuditLog>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            students: Arc::new(RwLock::new(HashMap::new())),
            courses: Arc::new(RwLock::new(HashMap::new())),
            sections: Arc::new(RwLock::new(HashMap::new())),
            waitlists: Arc::new(RwLock::new(HashMap::new())),
            enrollments: Arc::new(RwLock::new(HashMap::new())),
            periods: Arc::new(RwLock::new(HashMap::new())),
            // Role grants are data, not code: the default seed mirrors what
            // the Postgres migration inserts.
            role_permissions: Arc::new(RwLock::new(default_role_grants())),
            user_permissions: Arc::new(RwLock::new(HashMap::new())),
            overrides: Arc::new(RwLock::new(HashMap::new())),
            audit: Arc::new(RwLock::new(AuditLog::default())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistrarStore for InMemoryStore {
    async fn create_user(&self, user: User) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.user_id) {
            return Err(StoreError::Conflict("user exists".into()));
        }
        users.insert(user.user_id.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: &str) -> StoreResult<User> {
        self.users
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("user".into()))
    }

    async fn upsert_student(&self, profile: StudentProfile) -> StoreResult<StudentProfile> {
        // Profiles are one-to-one with accounts; reject orphan profiles.
        if !self.users.read().await.contains_key(&profile.user_id) {
            return Err(StoreError::NotFound("user".into()));
        }
        self.students
            .write()
            .await
            .insert(profile.student_id.clone(), profile.clone());
        Ok(profile)
    }

    async fn get_student(&self, student_id: &str) -> StoreResult<StudentProfile> {
        self.students
            .read()
            .await
            .get(student_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("student".into()))
    }

    async fn create_course(&self, course: Course) -> StoreResult<Course> {
        let mut courses = self.courses.write().await;
        if courses.contains_key(&course.course_id) {
            return Err(StoreError::Conflict("course exists".into()));
        }
        courses.insert(course.course_id.clone(), course.clone());
        Ok(course)
    }

    async fn get_course(&self, course_id: &str) -> StoreResult<Course> {
        self.courses
            .read()
            .await
            .get(course_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("course".into()))
    }

    async fn list_sections(&self, course_id: &str) -> StoreResult<Vec<Section>> {
        let mut items: Vec<Section> = self
            .sections
            .read()
            .await
            .values()
            .filter(|section| section.course_id == course_id)
            .cloned()
            .collect();
        items.sort_by_key(|section| section.section_number);
        Ok(items)
    }

    async fn create_section(&self, section: Section) -> StoreResult<Section> {
        if !self.courses.read().await.contains_key(&section.course_id) {
            return Err(StoreError::NotFound("course".into()));
        }
        let mut sections = self.sections.write().await;
        if sections.contains_key(&section.section_id) {
            return Err(StoreError::Conflict("section exists".into()));
        }
        if sections.values().any(|existing| {
            existing.course_id == section.course_id
                && existing.section_number == section.section_number
        }) {
            return Err(StoreError::Conflict("section number taken".into()));
        }
        sections.insert(section.section_id.clone(), section.clone());
        metrics::gauge!("registrar_sections_total").set(sections.len() as f64);
        Ok(section)
    }

    async fn add_to_roster(&self, section_id: &str, student_id: &str) -> StoreResult<()> {
        let mut sections = self.sections.write().await;
        let section = sections
            .get_mut(section_id)
            .ok_or_else(|| StoreError::NotFound("section".into()))?;
        if !section.has_open_seat() {
            return Err(StoreError::Conflict("section full".into()));
        }
        if section.roster.iter().any(|id| id == student_id) {
            return Err(StoreError::Conflict("already on roster".into()));
        }
        section.roster.push(student_id.to_string());
        Ok(())
    }

    async fn remove_from_roster(&self, section_id: &str, student_id: &str) -> StoreResult<()> {
        let mut sections = self.sections.write().await;
        let section = sections
            .get_mut(section_id)
            .ok_or_else(|| StoreError::NotFound("section".into()))?;
        let before = section.roster.len();
        // Retain preserves the order of the remaining seat holders.
        section.roster.retain(|id| id != student_id);
        if section.roster.len() == before {
            return Err(StoreError::NotFound("roster entry".into()));
        }
        Ok(())
    }

    async fn course_waitlist(&self, course_id: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .waitlists
            .read()
            .await
            .get(course_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn push_course_waitlist(&self, course_id: &str, student_id: &str) -> StoreResult<usize> {
        if !self.courses.read().await.contains_key(course_id) {
            return Err(StoreError::NotFound("course".into()));
        }
        let mut waitlists = self.waitlists.write().await;
        let entries = waitlists.entry(course_id.to_string()).or_default();
        // Append iff absent; the position is reported either way.
        let position = match entries.iter().position(|id| id == student_id) {
            Some(index) => index + 1,
            None => {
                entries.push(student_id.to_string());
                entries.len()
            }
        };
        metrics::gauge!("registrar_waitlist_depth", "course" => course_id.to_string())
            .set(entries.len() as f64);
        Ok(position)
    }

    async fn pop_course_waitlist(&self, course_id: &str) -> StoreResult<Option<String>> {
        let mut waitlists = self.waitlists.write().await;
        let Some(entries) = waitlists.get_mut(course_id) else {
            return Ok(None);
        };
        if entries.is_empty() {
            return Ok(None);
        }
        let head = entries.remove(0);
        metrics::gauge!("registrar_waitlist_depth", "course" => course_id.to_string())
            .set(entries.len() as f64);
        Ok(Some(head))
    }

    async fn remove_from_course_waitlist(
        &self,
        course_id: &str,
        student_id: &str,
    ) -> StoreResult<bool> {
        let mut waitlists = self.waitlists.write().await;
        let Some(entries) = waitlists.get_mut(course_id) else {
            return Ok(false);
        };
        let before = entries.len();
        entries.retain(|id| id != student_id);
        let removed = entries.len() != before;
        if removed {
            metrics::gauge!("registrar_waitlist_depth", "course" => course_id.to_string())
                .set(entries.len() as f64);
        }
        Ok(removed)
    }

    async fn get_enrollment(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> StoreResult<Option<EnrollmentRecord>> {
        Ok(self
            .enrollments
            .read()
            .await
            .get(&(student_id.to_string(), course_id.to_string()))
            .cloned())
    }

    async fn put_enrollment(&self, record: EnrollmentRecord) -> StoreResult<()> {
        self.enrollments.write().await.insert(
            (record.student_id.clone(), record.course_id.clone()),
            record,
        );
        Ok(())
    }

    async fn list_periods(&self) -> StoreResult<Vec<EnrollmentPeriod>> {
        let mut items: Vec<EnrollmentPeriod> =
            self.periods.read().await.values().cloned().collect();
        items.sort_by_key(|period| period.start);
        Ok(items)
    }

    async fn create_period(&self, period: EnrollmentPeriod) -> StoreResult<EnrollmentPeriod> {
        let mut periods = self.periods.write().await;
        if periods.contains_key(&period.period_id) {
            return Err(StoreError::Conflict("period exists".into()));
        }
        periods.insert(period.period_id, period.clone());
        Ok(period)
    }

    async fn get_period(&self, period_id: Uuid) -> StoreResult<EnrollmentPeriod> {
        self.periods
            .read()
            .await
            .get(&period_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("enrollment period".into()))
    }

    async fn update_period(&self, period: EnrollmentPeriod) -> StoreResult<EnrollmentPeriod> {
        let mut periods = self.periods.write().await;
        if !periods.contains_key(&period.period_id) {
            return Err(StoreError::NotFound("enrollment period".into()));
        }
        periods.insert(period.period_id, period.clone());
        Ok(period)
    }

    async fn delete_period(&self, period_id: Uuid) -> StoreResult<()> {
        if self.periods.write().await.remove(&period_id).is_none() {
            return Err(StoreError::NotFound("enrollment period".into()));
        }
        Ok(())
    }

    async fn role_permissions(&self, role: Role) -> StoreResult<Vec<RolePermission>> {
        Ok(self
            .role_permissions
            .read()
            .await
            .iter()
            .filter(|grant| grant.role == role)
            .cloned()
            .collect())
    }

    async fn user_permissions(&self, user_id: &str) -> StoreResult<Vec<UserPermission>> {
        Ok(self
            .user_permissions
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn grant_user_permission(&self, grant: UserPermission) -> StoreResult<()> {
        self.user_permissions
            .write()
            .await
            .entry(grant.user_id.clone())
            .or_default()
            .push(grant);
        Ok(())
    }

    async fn create_override(&self, request: OverrideRequest) -> StoreResult<OverrideRequest> {
        let mut overrides = self.overrides.write().await;
        if overrides.contains_key(&request.request_id) {
            return Err(StoreError::Conflict("override request exists".into()));
        }
        overrides.insert(request.request_id, request.clone());
        Ok(request)
    }

    async fn get_override(&self, request_id: Uuid) -> StoreResult<OverrideRequest> {
        self.overrides
            .read()
            .await
            .get(&request_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("override request".into()))
    }

    async fn list_overrides(
        &self,
        state: Option<OverrideState>,
    ) -> StoreResult<Vec<OverrideRequest>> {
        let mut items: Vec<OverrideRequest> = self
            .overrides
            .read()
            .await
            .values()
            .filter(|request| state.map(|s| request.state == s).unwrap_or(true))
            .cloned()
            .collect();
        items.sort_by_key(|request| request.requested_at);
        Ok(items)
    }

    async fn update_override(&self, request: OverrideRequest) -> StoreResult<OverrideRequest> {
        let mut overrides = self.overrides.write().await;
        if !overrides.contains_key(&request.request_id) {
            return Err(StoreError::NotFound("override request".into()));
        }
        overrides.insert(request.request_id, request.clone());
        Ok(request)
    }

    async fn append_audit(&self, entry: AuditEntry) -> StoreResult<u64> {
        Ok(self.audit.write().await.append(entry))
    }

    async fn query_audit(&self, query: AuditQuery) -> StoreResult<Vec<AuditEntry>> {
        Ok(self
            .audit
            .read()
            .await
            .entries
            .iter()
            .filter(|entry| query.matches(entry))
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> StoreResult<()> {
        // In-memory backend is always "healthy" if the process is running.
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
