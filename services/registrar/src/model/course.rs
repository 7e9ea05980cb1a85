//! Course catalog and section models.
//!
//! # Purpose
//! Defines catalog entries and their concrete sections. A section's roster is
//! an ordered sequence and is the sole source of truth for seat occupancy;
//! enrollment counts are always derived from it, never stored separately.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Marker in a course description that flags the course as archived even when
/// the explicit flag was never set. Legacy data uses the description marker.
pub const ARCHIVED_MARKER: &str = "ARCHIVED";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Course {
    pub course_id: String,
    /// Human-facing course code (e.g. `CS-2110`).
    pub code: String,
    pub name: String,
    pub department: String,
    pub credits: u32,
    /// Seat limit applied to sections created for this course.
    pub default_enrollment_limit: u32,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Course ids that must appear in a student's completed set.
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub description: String,
}

impl Course {
    /// A course stops accepting enrollment changes when archived, either via
    /// the explicit flag or the legacy description marker.
    pub fn is_archived(&self) -> bool {
        self.archived || self.description.contains(ARCHIVED_MARKER)
    }
}

/// A concrete offering of a course with its own seat limit and roster.
///
/// Invariants (enforced by the enrollment engine under the course lock):
/// - `roster.len() <= enrollment_limit`
/// - a student id appears in at most one section roster per course
/// - `section_number` is unique within the parent course and monotonic by
///   creation order
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Section {
    pub section_id: String,
    pub course_id: String,
    pub section_number: u32,
    /// Blank until an administrator assigns teaching staff.
    pub faculty_id: Option<String>,
    pub enrollment_limit: u32,
    /// Ordered seat holders; order is authoritative.
    #[serde(default)]
    pub roster: Vec<String>,
}

impl Section {
    pub fn has_open_seat(&self) -> bool {
        (self.roster.len() as u32) < self.enrollment_limit
    }

    pub fn current_enrollment(&self) -> u32 {
        self.roster.len() as u32
    }
}
