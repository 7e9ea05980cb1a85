//! Section registry operations.
//!
//! # Purpose
//! Seat-placement helpers over the store: locating the open section a new
//! enrollment should land in and allocating overflow sections on demand.
//! Callers must hold the course lock; these helpers perform the reads and
//! writes but do not serialize them.
use crate::model::{Course, Section};
use crate::store::{RegistrarStore, StoreResult};

/// Deterministic section id derived from the course and section number.
pub fn section_id(course_id: &str, section_number: u32) -> String {
    format!("{course_id}-s{section_number}")
}

/// The lowest-numbered section with a free seat, or `None` when every section
/// is full. Sections are returned by the store in section-number order, so
/// the first open one is the stable choice.
pub async fn find_open_section(
    store: &dyn RegistrarStore,
    course_id: &str,
) -> StoreResult<Option<Section>> {
    let sections = store.list_sections(course_id).await?;
    Ok(sections.into_iter().find(|section| section.has_open_seat()))
}

/// Allocate a new section for `course` with the course's default limit, an
/// empty roster, and no faculty assignment. The section number is one past
/// the current maximum, or `1` for the first section.
pub async fn create_overflow_section(
    store: &dyn RegistrarStore,
    course: &Course,
) -> StoreResult<Section> {
    let existing = store.list_sections(&course.course_id).await?;
    let next_number = existing
        .iter()
        .map(|section| section.section_number)
        .max()
        .unwrap_or(0)
        + 1;
    let section = Section {
        section_id: section_id(&course.course_id, next_number),
        course_id: course.course_id.clone(),
        section_number: next_number,
        faculty_id: None,
        enrollment_limit: course.default_enrollment_limit,
        roster: vec![],
    };
    store.create_section(section).await
}
