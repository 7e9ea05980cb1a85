//! Postgres-backed implementation of the registrar store.
//!
//! # What this module is
//! Implements the `RegistrarStore` trait using Postgres (via `sqlx`) as the
//! durable system of record for accounts, the course catalog, enrollment
//! state, permissions, the override queue, and the audit log.
//!
//! # Data model
//! - Authoritative tables hold current state; ordered collections (rosters,
//!   the course waitlist, prerequisite sets) are JSONB arrays whose order is
//!   authoritative. Occupancy counts are always derived from the arrays.
//! - `audit_log` is append-only with a `BIGSERIAL` sequence assigned by
//!   Postgres; the sequence is the total-order contract for readers.
//!
//! # Consistency / atomicity
//! Each trait method is a single statement or a single transaction, so one
//! call is always internally consistent. Multi-call enrollment transactions
//! are serialized by the engine's per-course lock; roster and waitlist
//! read-modify-write cycles additionally take `FOR UPDATE` row locks so a
//! single call can never interleave with another writer.
//!
//! # Operational notes
//! - Migrations run at startup via `sqlx::migrate!("./migrations")`; startup
//!   fails rather than serving against a missing schema.
//! - Pool sizing and acquire timeouts are explicit because hanging on a
//!   saturated pool is worse than failing fast for an interactive API.
//! - Database URLs may contain credentials; they are never logged.
use super::{RegistrarStore, StoreError, StoreResult};
use crate::config::PostgresConfig;
use crate::model::{
    AuditAction, AuditEntry, AuditQuery, Course, EnrollmentPeriod, EnrollmentRecord,
    EnrollmentStatus, OverrideKind, OverrideRequest, OverrideState, Role, RolePermission,
    ScopeTemplate, Section, StudentGroup, StudentProfile, User, UserPermission, UserStatus,
};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Durable registrar store backed by Postgres.
pub struct PostgresStore {
    pool: PgPool,
}

#[derive(Debug, Clone, FromRow)]
struct DbUser {
    user_id: String,
    display_name: String,
    email: String,
    role: String,
    status: String,
    attributes: Value,
}

#[derive(Debug, Clone, FromRow)]
struct DbStudent {
    student_id: String,
    user_id: String,
    degree_program: String,
    academic_standing: String,
    gpa: f64,
    completed_courses: Value,
}

#[derive(Debug, Clone, FromRow)]
struct DbCourse {
    course_id: String,
    code: String,
    name: String,
    department: String,
    credits: i32,
    default_enrollment_limit: i32,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    prerequisites: Value,
    archived: bool,
    description: String,
}

#[derive(Debug, Clone, FromRow)]
struct DbSection {
    section_id: String,
    course_id: String,
    section_number: i32,
    faculty_id: Option<String>,
    enrollment_limit: i32,
    roster: Value,
}

#[derive(Debug, Clone, FromRow)]
struct DbEnrollment {
    student_id: String,
    course_id: String,
    section_id: Option<String>,
    status: String,
    enrolled_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbPeriod {
    period_id: Uuid,
    name: String,
    degree_programs: Value,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    priority_end: Option<DateTime<Utc>>,
    active: bool,
}

#[derive(Debug, Clone, FromRow)]
struct DbRolePermission {
    role: String,
    codename: String,
    scope: Value,
}

#[derive(Debug, Clone, FromRow)]
struct DbUserPermission {
    user_id: String,
    codename: String,
    expires_at: Option<DateTime<Utc>>,
    scope: Option<Value>,
}

#[derive(Debug, Clone, FromRow)]
struct DbOverride {
    request_id: Uuid,
    student_id: String,
    course_id: String,
    kind: String,
    reason: String,
    state: String,
    requested_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    processed_by: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
struct DbAuditEntry {
    seq: i64,
    ts: DateTime<Utc>,
    actor_id: String,
    action: String,
    course_id: String,
    student_id: String,
    before: Value,
    after: Value,
}

impl PostgresStore {
    /// Connect to Postgres and run embedded migrations.
    pub async fn connect(pg: &PostgresConfig) -> StoreResult<Self> {
        Self::connect_internal(pg, true).await
    }

    /// Connect without running migrations; for tests that manage the schema
    /// externally.
    #[cfg(any(test, feature = "pg-tests"))]
    pub async fn connect_without_migrations(pg: &PostgresConfig) -> StoreResult<Self> {
        Self::connect_internal(pg, false).await
    }

    async fn connect_internal(pg: &PostgresConfig, run_migrations: bool) -> StoreResult<Self> {
        let connect_options = PgConnectOptions::from_str(&pg.url)?;
        let pool = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .acquire_timeout(Duration::from_millis(pg.acquire_timeout_ms))
            .connect_with(connect_options)
            .await?;

        if run_migrations {
            sqlx::migrate!("./migrations").run(&pool).await?;
        }

        Ok(Self { pool })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|code| code == "23505").unwrap_or(false);
    }
    false
}

fn string_vec(value: Value) -> StoreResult<Vec<String>> {
    serde_json::from_value(value).map_err(|err| StoreError::Unexpected(anyhow!(err)))
}

fn json_of<T: serde::Serialize>(value: &T) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(|err| StoreError::Unexpected(anyhow!(err)))
}

fn parse_tag<T>(kind: &str, raw: &str, parsed: Option<T>) -> StoreResult<T> {
    parsed.ok_or_else(|| StoreError::Unexpected(anyhow!("invalid {kind} tag in database: {raw}")))
}

fn user_status_str(status: UserStatus) -> &'static str {
    match status {
        UserStatus::Active => "active",
        UserStatus::Inactive => "inactive",
        UserStatus::Suspended => "suspended",
        UserStatus::Locked => "locked",
    }
}

fn parse_user_status(raw: &str) -> Option<UserStatus> {
    match raw {
        "active" => Some(UserStatus::Active),
        "inactive" => Some(UserStatus::Inactive),
        "suspended" => Some(UserStatus::Suspended),
        "locked" => Some(UserStatus::Locked),
        _ => None,
    }
}

fn enrollment_status_str(status: EnrollmentStatus) -> &'static str {
    match status {
        EnrollmentStatus::Active => "active",
        EnrollmentStatus::Waitlisted => "waitlisted",
        EnrollmentStatus::Completed => "completed",
        EnrollmentStatus::Dropped => "dropped",
    }
}

fn parse_enrollment_status(raw: &str) -> Option<EnrollmentStatus> {
    match raw {
        "active" => Some(EnrollmentStatus::Active),
        "waitlisted" => Some(EnrollmentStatus::Waitlisted),
        "completed" => Some(EnrollmentStatus::Completed),
        "dropped" => Some(EnrollmentStatus::Dropped),
        _ => None,
    }
}

fn override_kind_str(kind: OverrideKind) -> &'static str {
    match kind {
        OverrideKind::Prerequisite => "prerequisite",
        OverrideKind::Capacity => "capacity",
        OverrideKind::Window => "window",
        OverrideKind::Other => "other",
    }
}

fn parse_override_kind(raw: &str) -> Option<OverrideKind> {
    match raw {
        "prerequisite" => Some(OverrideKind::Prerequisite),
        "capacity" => Some(OverrideKind::Capacity),
        "window" => Some(OverrideKind::Window),
        "other" => Some(OverrideKind::Other),
        _ => None,
    }
}

fn override_state_str(state: OverrideState) -> &'static str {
    match state {
        OverrideState::Pending => "pending",
        OverrideState::Approved => "approved",
        OverrideState::Rejected => "rejected",
    }
}

fn audit_action_str(action: AuditAction) -> &'static str {
    match action {
        AuditAction::Enrolled => "enrolled",
        AuditAction::Waitlisted => "waitlisted",
        AuditAction::Dropped => "dropped",
        AuditAction::Promoted => "promoted",
        AuditAction::SectionCreated => "section_created",
        AuditAction::OverrideRequested => "override_requested",
        AuditAction::OverrideProcessed => "override_processed",
    }
}

fn parse_audit_action(raw: &str) -> Option<AuditAction> {
    match raw {
        "enrolled" => Some(AuditAction::Enrolled),
        "waitlisted" => Some(AuditAction::Waitlisted),
        "dropped" => Some(AuditAction::Dropped),
        "promoted" => Some(AuditAction::Promoted),
        "section_created" => Some(AuditAction::SectionCreated),
        "override_requested" => Some(AuditAction::OverrideRequested),
        "override_processed" => Some(AuditAction::OverrideProcessed),
        _ => None,
    }
}

fn user_from_db(row: DbUser) -> StoreResult<User> {
    Ok(User {
        role: parse_tag("role", &row.role, Role::parse(&row.role))?,
        status: parse_tag("status", &row.status, parse_user_status(&row.status))?,
        attributes: serde_json::from_value(row.attributes)
            .map_err(|err| StoreError::Unexpected(anyhow!(err)))?,
        user_id: row.user_id,
        display_name: row.display_name,
        email: row.email,
    })
}

fn student_from_db(row: DbStudent) -> StoreResult<StudentProfile> {
    Ok(StudentProfile {
        completed_courses: string_vec(row.completed_courses)?,
        student_id: row.student_id,
        user_id: row.user_id,
        degree_program: row.degree_program,
        academic_standing: row.academic_standing,
        gpa: row.gpa,
    })
}

fn course_from_db(row: DbCourse) -> StoreResult<Course> {
    Ok(Course {
        prerequisites: string_vec(row.prerequisites)?,
        course_id: row.course_id,
        code: row.code,
        name: row.name,
        department: row.department,
        credits: row.credits as u32,
        default_enrollment_limit: row.default_enrollment_limit as u32,
        start_date: row.start_date,
        end_date: row.end_date,
        archived: row.archived,
        description: row.description,
    })
}

fn section_from_db(row: DbSection) -> StoreResult<Section> {
    Ok(Section {
        roster: string_vec(row.roster)?,
        section_id: row.section_id,
        course_id: row.course_id,
        section_number: row.section_number as u32,
        faculty_id: row.faculty_id,
        enrollment_limit: row.enrollment_limit as u32,
    })
}

fn enrollment_from_db(row: DbEnrollment) -> StoreResult<EnrollmentRecord> {
    Ok(EnrollmentRecord {
        status: parse_tag(
            "enrollment status",
            &row.status,
            parse_enrollment_status(&row.status),
        )?,
        student_id: row.student_id,
        course_id: row.course_id,
        section_id: row.section_id,
        enrolled_at: row.enrolled_at,
        updated_at: row.updated_at,
    })
}

fn period_from_db(row: DbPeriod) -> StoreResult<EnrollmentPeriod> {
    Ok(EnrollmentPeriod {
        group: StudentGroup {
            degree_programs: string_vec(row.degree_programs)?,
        },
        period_id: row.period_id,
        name: row.name,
        start: row.start_at,
        end: row.end_at,
        priority_end: row.priority_end,
        active: row.active,
    })
}

fn override_from_db(row: DbOverride) -> StoreResult<OverrideRequest> {
    Ok(OverrideRequest {
        kind: parse_tag("override kind", &row.kind, parse_override_kind(&row.kind))?,
        state: parse_tag(
            "override state",
            &row.state,
            OverrideState::parse(&row.state),
        )?,
        request_id: row.request_id,
        student_id: row.student_id,
        course_id: row.course_id,
        reason: row.reason,
        requested_at: row.requested_at,
        processed_at: row.processed_at,
        processed_by: row.processed_by,
        notes: row.notes,
    })
}

fn audit_from_db(row: DbAuditEntry) -> StoreResult<AuditEntry> {
    Ok(AuditEntry {
        action: parse_tag(
            "audit action",
            &row.action,
            parse_audit_action(&row.action),
        )?,
        seq: row.seq as u64,
        timestamp: row.ts,
        actor_id: row.actor_id,
        course_id: row.course_id,
        student_id: row.student_id,
        before: row.before,
        after: row.after,
    })
}

#[async_trait]
impl RegistrarStore for PostgresStore {
    async fn create_user(&self, user: User) -> StoreResult<User> {
        let insert = sqlx::query(
            r#"INSERT INTO users (user_id, display_name, email, role, status, attributes)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(&user.user_id)
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user_status_str(user.status))
        .bind(json_of(&user.attributes)?)
        .execute(&self.pool)
        .await;
        match insert {
            Ok(_) => Ok(user),
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::Conflict("user exists".into()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get_user(&self, user_id: &str) -> StoreResult<User> {
        let row = sqlx::query_as::<_, DbUser>(
            r#"SELECT user_id, display_name, email, role, status, attributes
               FROM users WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound("user".into()))?;
        user_from_db(row)
    }

    async fn upsert_student(&self, profile: StudentProfile) -> StoreResult<StudentProfile> {
        let user_exists =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE user_id = $1")
                .bind(&profile.user_id)
                .fetch_one(&self.pool)
                .await?;
        if user_exists == 0 {
            return Err(StoreError::NotFound("user".into()));
        }
        sqlx::query(
            r#"INSERT INTO student_profiles
                   (student_id, user_id, degree_program, academic_standing, gpa, completed_courses)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT (student_id) DO UPDATE SET
                   user_id = EXCLUDED.user_id,
                   degree_program = EXCLUDED.degree_program,
                   academic_standing = EXCLUDED.academic_standing,
                   gpa = EXCLUDED.gpa,
                   completed_courses = EXCLUDED.completed_courses"#,
        )
        .bind(&profile.student_id)
        .bind(&profile.user_id)
        .bind(&profile.degree_program)
        .bind(&profile.academic_standing)
        .bind(profile.gpa)
        .bind(json_of(&profile.completed_courses)?)
        .execute(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn get_student(&self, student_id: &str) -> StoreResult<StudentProfile> {
        let row = sqlx::query_as::<_, DbStudent>(
            r#"SELECT student_id, user_id, degree_program, academic_standing, gpa,
                      completed_courses
               FROM student_profiles WHERE student_id = $1"#,
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound("student".into()))?;
        student_from_db(row)
    }

    async fn create_course(&self, course: Course) -> StoreResult<Course> {
        let insert = sqlx::query(
            r#"INSERT INTO courses
                   (course_id, code, name, department, credits, default_enrollment_limit,
                    start_date, end_date, prerequisites, archived, description)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
        )
        .bind(&course.course_id)
        .bind(&course.code)
        .bind(&course.name)
        .bind(&course.department)
        .bind(course.credits as i32)
        .bind(course.default_enrollment_limit as i32)
        .bind(course.start_date)
        .bind(course.end_date)
        .bind(json_of(&course.prerequisites)?)
        .bind(course.archived)
        .bind(&course.description)
        .execute(&self.pool)
        .await;
        match insert {
            Ok(_) => Ok(course),
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::Conflict("course exists".into()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get_course(&self, course_id: &str) -> StoreResult<Course> {
        let row = sqlx::query_as::<_, DbCourse>(
            r#"SELECT course_id, code, name, department, credits, default_enrollment_limit,
                      start_date, end_date, prerequisites, archived, description
               FROM courses WHERE course_id = $1"#,
        )
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound("course".into()))?;
        course_from_db(row)
    }

    async fn list_sections(&self, course_id: &str) -> StoreResult<Vec<Section>> {
        let rows = sqlx::query_as::<_, DbSection>(
            r#"SELECT section_id, course_id, section_number, faculty_id, enrollment_limit, roster
               FROM sections WHERE course_id = $1 ORDER BY section_number"#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(section_from_db).collect()
    }

    async fn create_section(&self, section: Section) -> StoreResult<Section> {
        let course_exists =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses WHERE course_id = $1")
                .bind(&section.course_id)
                .fetch_one(&self.pool)
                .await?;
        if course_exists == 0 {
            return Err(StoreError::NotFound("course".into()));
        }
        let insert = sqlx::query(
            r#"INSERT INTO sections
                   (section_id, course_id, section_number, faculty_id, enrollment_limit, roster)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(&section.section_id)
        .bind(&section.course_id)
        .bind(section.section_number as i32)
        .bind(&section.faculty_id)
        .bind(section.enrollment_limit as i32)
        .bind(json_of(&section.roster)?)
        .execute(&self.pool)
        .await;
        match insert {
            Ok(_) => Ok(section),
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::Conflict("section number taken".into()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn add_to_roster(&self, section_id: &str, student_id: &str) -> StoreResult<()> {
        // Read-modify-write under a row lock so one call is atomic even
        // without the engine's course lock.
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, DbSection>(
            r#"SELECT section_id, course_id, section_number, faculty_id, enrollment_limit, roster
               FROM sections WHERE section_id = $1 FOR UPDATE"#,
        )
        .bind(section_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound("section".into()))?;
        let mut roster = string_vec(row.roster)?;
        if roster.len() as i32 >= row.enrollment_limit {
            return Err(StoreError::Conflict("section full".into()));
        }
        if roster.iter().any(|id| id == student_id) {
            return Err(StoreError::Conflict("already on roster".into()));
        }
        roster.push(student_id.to_string());
        sqlx::query("UPDATE sections SET roster = $2 WHERE section_id = $1")
            .bind(section_id)
            .bind(json_of(&roster)?)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn remove_from_roster(&self, section_id: &str, student_id: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, DbSection>(
            r#"SELECT section_id, course_id, section_number, faculty_id, enrollment_limit, roster
               FROM sections WHERE section_id = $1 FOR UPDATE"#,
        )
        .bind(section_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound("section".into()))?;
        let mut roster = string_vec(row.roster)?;
        let before = roster.len();
        roster.retain(|id| id != student_id);
        if roster.len() == before {
            return Err(StoreError::NotFound("roster entry".into()));
        }
        sqlx::query("UPDATE sections SET roster = $2 WHERE section_id = $1")
            .bind(section_id)
            .bind(json_of(&roster)?)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn course_waitlist(&self, course_id: &str) -> StoreResult<Vec<String>> {
        let value =
            sqlx::query_scalar::<_, Value>("SELECT waitlist FROM courses WHERE course_id = $1")
                .bind(course_id)
                .fetch_optional(&self.pool)
                .await?;
        match value {
            Some(value) => string_vec(value),
            None => Ok(vec![]),
        }
    }

    async fn push_course_waitlist(&self, course_id: &str, student_id: &str) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await?;
        let value = sqlx::query_scalar::<_, Value>(
            "SELECT waitlist FROM courses WHERE course_id = $1 FOR UPDATE",
        )
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound("course".into()))?;
        let mut waitlist = string_vec(value)?;
        let position = match waitlist.iter().position(|id| id == student_id) {
            Some(index) => index + 1,
            None => {
                waitlist.push(student_id.to_string());
                waitlist.len()
            }
        };
        sqlx::query("UPDATE courses SET waitlist = $2 WHERE course_id = $1")
            .bind(course_id)
            .bind(json_of(&waitlist)?)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        metrics::gauge!("registrar_waitlist_depth", "course" => course_id.to_string())
            .set(waitlist.len() as f64);
        Ok(position)
    }

    async fn pop_course_waitlist(&self, course_id: &str) -> StoreResult<Option<String>> {
        let mut tx = self.pool.begin().await?;
        let value = sqlx::query_scalar::<_, Value>(
            "SELECT waitlist FROM courses WHERE course_id = $1 FOR UPDATE",
        )
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(value) = value else {
            return Ok(None);
        };
        let mut waitlist = string_vec(value)?;
        if waitlist.is_empty() {
            return Ok(None);
        }
        let head = waitlist.remove(0);
        sqlx::query("UPDATE courses SET waitlist = $2 WHERE course_id = $1")
            .bind(course_id)
            .bind(json_of(&waitlist)?)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        metrics::gauge!("registrar_waitlist_depth", "course" => course_id.to_string())
            .set(waitlist.len() as f64);
        Ok(Some(head))
    }

    async fn remove_from_course_waitlist(
        &self,
        course_id: &str,
        student_id: &str,
    ) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let value = sqlx::query_scalar::<_, Value>(
            "SELECT waitlist FROM courses WHERE course_id = $1 FOR UPDATE",
        )
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(value) = value else {
            return Ok(false);
        };
        let mut waitlist = string_vec(value)?;
        let before = waitlist.len();
        waitlist.retain(|id| id != student_id);
        if waitlist.len() == before {
            return Ok(false);
        }
        sqlx::query("UPDATE courses SET waitlist = $2 WHERE course_id = $1")
            .bind(course_id)
            .bind(json_of(&waitlist)?)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        metrics::gauge!("registrar_waitlist_depth", "course" => course_id.to_string())
            .set(waitlist.len() as f64);
        Ok(true)
    }

    async fn get_enrollment(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> StoreResult<Option<EnrollmentRecord>> {
        let row = sqlx::query_as::<_, DbEnrollment>(
            r#"SELECT student_id, course_id, section_id, status, enrolled_at, updated_at
               FROM enrollments WHERE student_id = $1 AND course_id = $2"#,
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(enrollment_from_db).transpose()
    }

    async fn put_enrollment(&self, record: EnrollmentRecord) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO enrollments
                   (student_id, course_id, section_id, status, enrolled_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT (student_id, course_id) DO UPDATE SET
                   section_id = EXCLUDED.section_id,
                   status = EXCLUDED.status,
                   enrolled_at = EXCLUDED.enrolled_at,
                   updated_at = EXCLUDED.updated_at"#,
        )
        .bind(&record.student_id)
        .bind(&record.course_id)
        .bind(&record.section_id)
        .bind(enrollment_status_str(record.status))
        .bind(record.enrolled_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_periods(&self) -> StoreResult<Vec<EnrollmentPeriod>> {
        let rows = sqlx::query_as::<_, DbPeriod>(
            r#"SELECT period_id, name, degree_programs, start_at, end_at, priority_end, active
               FROM enrollment_periods ORDER BY start_at"#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(period_from_db).collect()
    }

    async fn create_period(&self, period: EnrollmentPeriod) -> StoreResult<EnrollmentPeriod> {
        let insert = sqlx::query(
            r#"INSERT INTO enrollment_periods
                   (period_id, name, degree_programs, start_at, end_at, priority_end, active)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(period.period_id)
        .bind(&period.name)
        .bind(json_of(&period.group.degree_programs)?)
        .bind(period.start)
        .bind(period.end)
        .bind(period.priority_end)
        .bind(period.active)
        .execute(&self.pool)
        .await;
        match insert {
            Ok(_) => Ok(period),
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::Conflict("period exists".into()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get_period(&self, period_id: Uuid) -> StoreResult<EnrollmentPeriod> {
        let row = sqlx::query_as::<_, DbPeriod>(
            r#"SELECT period_id, name, degree_programs, start_at, end_at, priority_end, active
               FROM enrollment_periods WHERE period_id = $1"#,
        )
        .bind(period_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound("enrollment period".into()))?;
        period_from_db(row)
    }

    async fn update_period(&self, period: EnrollmentPeriod) -> StoreResult<EnrollmentPeriod> {
        let result = sqlx::query(
            r#"UPDATE enrollment_periods SET
                   name = $2, degree_programs = $3, start_at = $4, end_at = $5,
                   priority_end = $6, active = $7
               WHERE period_id = $1"#,
        )
        .bind(period.period_id)
        .bind(&period.name)
        .bind(json_of(&period.group.degree_programs)?)
        .bind(period.start)
        .bind(period.end)
        .bind(period.priority_end)
        .bind(period.active)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("enrollment period".into()));
        }
        Ok(period)
    }

    async fn delete_period(&self, period_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM enrollment_periods WHERE period_id = $1")
            .bind(period_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("enrollment period".into()));
        }
        Ok(())
    }

    async fn role_permissions(&self, role: Role) -> StoreResult<Vec<RolePermission>> {
        let rows = sqlx::query_as::<_, DbRolePermission>(
            "SELECT role, codename, scope FROM role_permissions WHERE role = $1",
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                let scope: ScopeTemplate = serde_json::from_value(row.scope)
                    .map_err(|err| StoreError::Unexpected(anyhow!(err)))?;
                Ok(RolePermission {
                    role: parse_tag("role", &row.role, Role::parse(&row.role))?,
                    codename: row.codename,
                    scope,
                })
            })
            .collect()
    }

    async fn user_permissions(&self, user_id: &str) -> StoreResult<Vec<UserPermission>> {
        let rows = sqlx::query_as::<_, DbUserPermission>(
            r#"SELECT user_id, codename, expires_at, scope
               FROM user_permissions WHERE user_id = $1 ORDER BY id"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                let scope = row
                    .scope
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(|err| StoreError::Unexpected(anyhow!(err)))?;
                Ok(UserPermission {
                    user_id: row.user_id,
                    codename: row.codename,
                    expires_at: row.expires_at,
                    scope,
                })
            })
            .collect()
    }

    async fn grant_user_permission(&self, grant: UserPermission) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO user_permissions (user_id, codename, expires_at, scope)
               VALUES ($1, $2, $3, $4)"#,
        )
        .bind(&grant.user_id)
        .bind(&grant.codename)
        .bind(grant.expires_at)
        .bind(grant.scope.as_ref().map(json_of).transpose()?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_override(&self, request: OverrideRequest) -> StoreResult<OverrideRequest> {
        let insert = sqlx::query(
            r#"INSERT INTO override_requests
                   (request_id, student_id, course_id, kind, reason, state,
                    requested_at, processed_at, processed_by, notes)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(request.request_id)
        .bind(&request.student_id)
        .bind(&request.course_id)
        .bind(override_kind_str(request.kind))
        .bind(&request.reason)
        .bind(override_state_str(request.state))
        .bind(request.requested_at)
        .bind(request.processed_at)
        .bind(&request.processed_by)
        .bind(&request.notes)
        .execute(&self.pool)
        .await;
        match insert {
            Ok(_) => Ok(request),
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::Conflict("override request exists".into()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get_override(&self, request_id: Uuid) -> StoreResult<OverrideRequest> {
        let row = sqlx::query_as::<_, DbOverride>(
            r#"SELECT request_id, student_id, course_id, kind, reason, state,
                      requested_at, processed_at, processed_by, notes
               FROM override_requests WHERE request_id = $1"#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound("override request".into()))?;
        override_from_db(row)
    }

    async fn list_overrides(
        &self,
        state: Option<OverrideState>,
    ) -> StoreResult<Vec<OverrideRequest>> {
        let rows = sqlx::query_as::<_, DbOverride>(
            r#"SELECT request_id, student_id, course_id, kind, reason, state,
                      requested_at, processed_at, processed_by, notes
               FROM override_requests
               WHERE ($1::text IS NULL OR state = $1)
               ORDER BY requested_at"#,
        )
        .bind(state.map(override_state_str))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(override_from_db).collect()
    }

    async fn update_override(&self, request: OverrideRequest) -> StoreResult<OverrideRequest> {
        let result = sqlx::query(
            r#"UPDATE override_requests SET
                   state = $2, processed_at = $3, processed_by = $4, notes = $5
               WHERE request_id = $1"#,
        )
        .bind(request.request_id)
        .bind(override_state_str(request.state))
        .bind(request.processed_at)
        .bind(&request.processed_by)
        .bind(&request.notes)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("override request".into()));
        }
        Ok(request)
    }

    async fn append_audit(&self, entry: AuditEntry) -> StoreResult<u64> {
        let seq = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO audit_log (ts, actor_id, action, course_id, student_id, before, after)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING seq"#,
        )
        .bind(entry.timestamp)
        .bind(&entry.actor_id)
        .bind(audit_action_str(entry.action))
        .bind(&entry.course_id)
        .bind(&entry.student_id)
        .bind(&entry.before)
        .bind(&entry.after)
        .fetch_one(&self.pool)
        .await?;
        Ok(seq as u64)
    }

    async fn query_audit(&self, query: AuditQuery) -> StoreResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, DbAuditEntry>(
            r#"SELECT seq, ts, actor_id, action, course_id, student_id, before, after
               FROM audit_log
               WHERE ($1::text IS NULL OR course_id = $1)
                 AND ($2::text IS NULL OR student_id = $2)
                 AND ($3::timestamptz IS NULL OR ts >= $3)
                 AND ($4::timestamptz IS NULL OR ts < $4)
               ORDER BY seq"#,
        )
        .bind(query.course_id)
        .bind(query.student_id)
        .bind(query.from)
        .bind(query.to)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(audit_from_db).collect()
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
