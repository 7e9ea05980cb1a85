//! OpenAPI schema aggregation for the registrar API.
//!
//! # Purpose
//! Collects all routes and schema types into a single OpenAPI document for
//! docs and client generation.
use crate::api::{
    audit, enrollment, overrides, periods, system,
    types::{
        AuditListResponse, BulkEnrollRequest, BulkEnrollResponse, BulkEnrolledItem,
        BulkErroredItem, BulkWaitlistedItem, DropRequest, DropResponse, EnrollRequest,
        EnrollResponse, ErrorResponse, HealthStatus, OverrideCreateRequest,
        OverrideCreateResponse, OverrideListResponse, OverrideProcessRequest,
        PeriodListResponse, PeriodUpsertRequest, RosterResponse, SectionRoster, ServiceInfo,
    },
};
use crate::model::{
    AuditAction, AuditEntry, EnrollmentPeriod, OverrideKind, OverrideRequest, OverrideState,
    StudentGroup,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "campus-registrar",
        version = "v1",
        description = "Campus registrar enrollment HTTP API"
    ),
    paths(
        system::system_info,
        system::system_health,
        enrollment::enroll,
        enrollment::drop,
        enrollment::bulk_enroll,
        enrollment::course_roster,
        overrides::create_override,
        overrides::process_override,
        overrides::list_overrides,
        periods::list_periods,
        periods::create_period,
        periods::get_period,
        periods::update_period,
        periods::delete_period,
        audit::query_audit
    ),
    components(schemas(
        ErrorResponse,
        ServiceInfo,
        HealthStatus,
        EnrollRequest,
        EnrollResponse,
        DropRequest,
        DropResponse,
        BulkEnrollRequest,
        BulkEnrollResponse,
        BulkEnrolledItem,
        BulkWaitlistedItem,
        BulkErroredItem,
        RosterResponse,
        SectionRoster,
        OverrideCreateRequest,
        OverrideCreateResponse,
        OverrideProcessRequest,
        OverrideListResponse,
        OverrideRequest,
        OverrideKind,
        OverrideState,
        PeriodUpsertRequest,
        PeriodListResponse,
        EnrollmentPeriod,
        StudentGroup,
        AuditListResponse,
        AuditEntry,
        AuditAction
    )),
    tags(
        (name = "system", description = "System and discovery endpoints"),
        (name = "enrollment", description = "Enrollment, drops, and rosters"),
        (name = "overrides", description = "Admin override workflow"),
        (name = "periods", description = "Enrollment period management"),
        (name = "audit", description = "Enrollment audit trail")
    )
)]
pub struct ApiDoc;
