//! Permission grants and scope templates.
//!
//! # Purpose
//! Defines the data the permission evaluator consumes: role-level grants,
//! per-user grants with optional expiry, and the scope template grammar that
//! constrains a grant to matching target attributes.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::model::Role;

/// Allowed values for one scope key.
///
/// - `Any` (or an empty `Set`) leaves the attribute unconstrained.
/// - `One` requires equality with the target attribute.
/// - `Set` requires the target attribute to be a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ScopeValue {
    Any,
    One(String),
    Set(Vec<String>),
}

impl ScopeValue {
    pub fn admits(&self, target: &str) -> bool {
        match self {
            ScopeValue::Any => true,
            ScopeValue::One(value) => value == target,
            ScopeValue::Set(values) => values.is_empty() || values.iter().any(|v| v == target),
        }
    }
}

/// Mapping from attribute key to allowed values. Keys absent from the
/// template leave that attribute unconstrained; an empty template admits any
/// target.
pub type ScopeTemplate = HashMap<String, ScopeValue>;

/// A capability granted to every account holding a role.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RolePermission {
    pub role: Role,
    pub codename: String,
    #[serde(default)]
    pub scope: ScopeTemplate,
}

/// A capability granted to a single account, overriding or augmenting the
/// role grants. Inactive once expired.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserPermission {
    pub user_id: String,
    pub codename: String,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scope: Option<ScopeTemplate>,
}

impl UserPermission {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| now < exp).unwrap_or(true)
    }
}

/// Outcome of a permission evaluation. Denials carry the codename that was
/// required so the API layer can report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { missing: String },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn scope_value_membership() {
        assert!(ScopeValue::Any.admits("anything"));
        assert!(ScopeValue::One("Math".to_string()).admits("Math"));
        assert!(!ScopeValue::One("Math".to_string()).admits("Physics"));
        let set = ScopeValue::Set(vec!["Math".to_string(), "Physics".to_string()]);
        assert!(set.admits("Physics"));
        assert!(!set.admits("History"));
        // An empty collection means "any value".
        assert!(ScopeValue::Set(vec![]).admits("History"));
    }

    #[test]
    fn user_permission_expiry() {
        let now = Utc::now();
        let mut grant = UserPermission {
            user_id: "u1".to_string(),
            codename: "roster:view".to_string(),
            expires_at: None,
            scope: None,
        };
        assert!(grant.is_active(now));
        grant.expires_at = Some(now + Duration::hours(1));
        assert!(grant.is_active(now));
        grant.expires_at = Some(now - Duration::hours(1));
        assert!(!grant.is_active(now));
    }
}
