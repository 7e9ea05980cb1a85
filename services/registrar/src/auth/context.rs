//! Resolved caller identity.
//!
//! # Purpose
//! The explicit context value produced by authentication and passed to every
//! core operation. There is no ambient request state; handlers thread this
//! through.
use std::collections::HashMap;

use crate::model::{Role, User};

/// Attribute keys surfaced into the call context at resolution time.
pub const ATTR_STUDENT_ID: &str = "student_id";
pub const ATTR_DEGREE_PROGRAM: &str = "degree_program";
pub const ATTR_DEPARTMENT: &str = "department";
pub const ATTR_EMPLOYEE_ID: &str = "employee_id";

#[derive(Debug, Clone)]
pub struct CallContext {
    pub user_id: String,
    pub role: Role,
    /// Role-specific attributes: student id and degree program for students,
    /// employee id and department for faculty, employee id for admins.
    pub attributes: HashMap<String, String>,
}

impl CallContext {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.user_id.clone(),
            role: user.role,
            attributes: user.attributes.clone(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// The caller's own student id, present only for student accounts.
    pub fn student_id(&self) -> Option<&str> {
        self.attribute(ATTR_STUDENT_ID)
    }
}
