//! HTTP API request/response types.
//!
//! # Purpose
//! Defines shared payload shapes for the registrar REST API and OpenAPI
//! schema generation.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::model::{AuditEntry, EnrollmentPeriod, OverrideKind, OverrideRequest, StudentGroup};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `false` in error envelopes.
    pub success: bool,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ServiceInfo {
    pub api_version: String,
    pub storage_backend: String,
    pub durable_storage: bool,
    pub session_kv: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct EnrollRequest {
    pub course_id: String,
    /// Defaults to the caller's own student id for student callers.
    pub student_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct EnrollResponse {
    /// `enrolled` or `waitlisted`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waitlist_position: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct DropRequest {
    pub course_id: String,
    pub student_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct DropResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct BulkEnrollRequest {
    pub course_id: String,
    pub student_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct BulkEnrolledItem {
    pub student_id: String,
    pub section_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct BulkWaitlistedItem {
    pub student_id: String,
    pub waitlist_position: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct BulkErroredItem {
    pub student_id: String,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct BulkEnrollResponse {
    pub enrolled: Vec<BulkEnrolledItem>,
    pub waitlisted: Vec<BulkWaitlistedItem>,
    pub errored: Vec<BulkErroredItem>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SectionRoster {
    pub section_id: String,
    pub section_number: u32,
    pub enrollment_limit: u32,
    pub roster: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct RosterResponse {
    pub course_id: String,
    pub sections: Vec<SectionRoster>,
    pub waitlist: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct OverrideCreateRequest {
    pub student_id: String,
    pub course_id: String,
    pub kind: OverrideKind,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct OverrideCreateResponse {
    pub request_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct OverrideProcessRequest {
    /// `approve` or `reject`.
    pub action: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct OverrideListResponse {
    pub items: Vec<OverrideRequest>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct PeriodUpsertRequest {
    pub name: String,
    #[serde(default)]
    pub group: Option<StudentGroup>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub priority_end: Option<DateTime<Utc>>,
    pub active: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct PeriodListResponse {
    pub items: Vec<EnrollmentPeriod>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AuditListResponse {
    pub items: Vec<AuditEntry>,
}
