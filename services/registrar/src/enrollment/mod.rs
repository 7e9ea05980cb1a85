//! Enrollment admission core.
//!
//! # Purpose
//! Groups the window gate, section registry helpers, per-course locks, the
//! enrollment engine with its waitlist promoter, and the admin override
//! workflow.
pub mod engine;
pub mod locks;
pub mod overrides;
pub mod sections;
pub mod window;

pub use engine::{
    override_gates, BulkEnrollOutcome, EnrollError, EnrollOutcome, EnrollmentEngine, OverrideSet,
};
pub use locks::DEFAULT_LOCK_TIMEOUT;
pub use overrides::{OverrideDecision, OverrideError};
