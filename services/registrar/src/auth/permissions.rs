//! Permission evaluator and capability catalog.
//!
//! # Purpose
//! Centralizes the capability codenames, the default role grants seeded into
//! stores, and the pure two-tier evaluation: unexpired user grants first,
//! role grants second, explicit deny otherwise. Keeping the scope math in one
//! place avoids privilege drift across endpoints.
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::model::{Decision, Role, RolePermission, ScopeTemplate, ScopeValue, UserPermission};

pub const ENROLLMENT_ENROLL: &str = "enrollment:enroll";
pub const ENROLLMENT_DROP: &str = "enrollment:drop";
pub const ROSTER_VIEW: &str = "roster:view";
pub const OVERRIDE_REQUEST: &str = "enrollment_override:request";
pub const OVERRIDE_PROCESS: &str = "enrollment_override:process";
pub const PERIOD_MANAGE: &str = "enrollment_period:manage";
pub const AUDIT_VIEW: &str = "audit:view";

/// Default role grants. These are data: the in-memory store seeds them at
/// construction and the Postgres migration inserts the same rows.
pub fn default_role_grants() -> Vec<RolePermission> {
    fn grant(role: Role, codename: &str) -> RolePermission {
        RolePermission {
            role,
            codename: codename.to_string(),
            scope: ScopeTemplate::new(),
        }
    }

    vec![
        grant(Role::Student, ENROLLMENT_ENROLL),
        grant(Role::Student, ENROLLMENT_DROP),
        RolePermission {
            role: Role::Faculty,
            codename: ROSTER_VIEW.to_string(),
            // Any department; narrower grants come in as user permissions.
            scope: ScopeTemplate::from([("department".to_string(), ScopeValue::Any)]),
        },
        grant(Role::Admin, ENROLLMENT_ENROLL),
        grant(Role::Admin, ENROLLMENT_DROP),
        grant(Role::Admin, ROSTER_VIEW),
        grant(Role::Admin, OVERRIDE_REQUEST),
        grant(Role::Admin, OVERRIDE_PROCESS),
        grant(Role::Admin, PERIOD_MANAGE),
        grant(Role::Admin, AUDIT_VIEW),
    ]
}

/// Whether a scope template admits the target attributes.
///
/// Each template key constrains one attribute: `Any` (or an empty set) leaves
/// it unconstrained, a single value requires equality, a set requires
/// membership. Keys absent from the template are unconstrained; a constrained
/// attribute missing from the target is not admitted.
pub fn scope_admits(scope: &ScopeTemplate, target: &HashMap<String, String>) -> bool {
    scope.iter().all(|(key, value)| match value {
        ScopeValue::Any => true,
        ScopeValue::Set(values) if values.is_empty() => true,
        constrained => target
            .get(key)
            .map(|attr| constrained.admits(attr))
            .unwrap_or(false),
    })
}

/// Evaluate whether the caller holds `codename` for the target attributes.
///
/// User grants are consulted first (they override or augment role grants),
/// then role grants. The evaluator is pure and side-effect free; a denial
/// names the missing codename.
pub fn evaluate(
    user_grants: &[UserPermission],
    role_grants: &[RolePermission],
    codename: &str,
    target: &HashMap<String, String>,
    now: DateTime<Utc>,
) -> Decision {
    let user_allowed = user_grants
        .iter()
        .filter(|grant| grant.codename == codename && grant.is_active(now))
        .any(|grant| match &grant.scope {
            None => true,
            Some(scope) => scope_admits(scope, target),
        });
    if user_allowed {
        return Decision::Allow;
    }

    let role_allowed = role_grants
        .iter()
        .filter(|grant| grant.codename == codename)
        .any(|grant| scope_admits(&grant.scope, target));
    if role_allowed {
        return Decision::Allow;
    }

    Decision::Deny {
        missing: codename.to_string(),
    }
}
