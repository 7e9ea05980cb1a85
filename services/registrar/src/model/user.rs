//! User identity and student profile models.
//!
//! # Purpose
//! Defines the account record, the closed role/status enumerations, and the
//! student profile attached to accounts with the `Student` role.
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Primary role of an account. Roles are closed; there are no free-form tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Faculty,
    Admin,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Admin => "admin",
            Role::Staff => "staff",
        }
    }

    pub fn parse(raw: &str) -> Option<Role> {
        match raw {
            "student" => Some(Role::Student),
            "faculty" => Some(Role::Faculty),
            "admin" => Some(Role::Admin),
            "staff" => Some(Role::Staff),
            _ => None,
        }
    }
}

/// Account lifecycle state. Accounts are never destroyed, only transitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
    Locked,
}

impl UserStatus {
    /// Whether the account may authenticate at all.
    pub fn may_authenticate(&self) -> bool {
        matches!(self, UserStatus::Active)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    /// Role-specific attributes surfaced into the call context: employee id
    /// and department for faculty, admin employee id for admins.
    #[serde(default)]
    pub attributes: std::collections::HashMap<String, String>,
}

/// Profile attached one-to-one to a `Student` account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentProfile {
    /// Human-visible student id (e.g. `STU-1024`); also the key the
    /// enrollment engine operates on.
    pub student_id: String,
    pub user_id: String,
    pub degree_program: String,
    pub academic_standing: String,
    pub gpa: f64,
    /// Course ids the student has completed; feeds the prerequisite check.
    #[serde(default)]
    pub completed_courses: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Student, Role::Faculty, Role::Admin, Role::Staff] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("registrar"), None);
    }

    #[test]
    fn only_active_accounts_authenticate() {
        assert!(UserStatus::Active.may_authenticate());
        assert!(!UserStatus::Inactive.may_authenticate());
        assert!(!UserStatus::Suspended.may_authenticate());
        assert!(!UserStatus::Locked.may_authenticate());
    }
}
