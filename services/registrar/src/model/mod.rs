//! Registrar data model module.
//!
//! # Purpose
//! Re-exports the user/course/enrollment/permission/override/audit models
//! shared by the API, engine, and store layers.
mod audit;
mod course;
mod enrollment;
mod override_request;
mod permission;
mod user;

pub use audit::{AuditAction, AuditEntry, AuditQuery};
pub use course::{Course, Section};
pub use enrollment::{
    EnrollmentPeriod, EnrollmentRecord, EnrollmentStatus, StudentGroup, WindowStatus,
};
pub use override_request::{OverrideKind, OverrideRequest, OverrideState};
pub use permission::{Decision, RolePermission, ScopeTemplate, ScopeValue, UserPermission};
pub use user::{Role, StudentProfile, User, UserStatus};
