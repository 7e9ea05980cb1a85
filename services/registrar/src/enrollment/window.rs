//! Enrollment window gate.
//!
//! # Purpose
//! Decides whether an instant falls inside any active enrollment period
//! applicable to a student's group. The gate is pure: it consumes the period
//! list loaded by the caller and performs no I/O.
use chrono::{DateTime, Utc};

use crate::model::{EnrollmentPeriod, WindowStatus};

/// Evaluate the enrollment window for a student at `now`.
///
/// Periods with `active = false` or a non-matching group predicate are
/// ignored. When no applicable window contains `now`, the closed verdict is
/// advisory: `ClosedBefore`/`ClosedAfter` is chosen relative to the nearest
/// applicable period, and `Inactive` means no period applies to the caller at
/// all. Callers treat anything that is not `InPriority`/`InGeneral` as
/// "window closed".
pub fn check_window(
    periods: &[EnrollmentPeriod],
    degree_program: &str,
    now: DateTime<Utc>,
) -> WindowStatus {
    let applicable: Vec<&EnrollmentPeriod> = periods
        .iter()
        .filter(|period| period.active && period.group.matches(degree_program))
        .collect();
    if applicable.is_empty() {
        return WindowStatus::Inactive;
    }

    if let Some(period) = applicable.iter().find(|period| period.contains(now)) {
        return match period.priority_end {
            Some(priority_end) if now < priority_end => WindowStatus::InPriority,
            _ => WindowStatus::InGeneral,
        };
    }

    // Closed: pick the verdict relative to whichever window edge is nearest.
    let next_start = applicable
        .iter()
        .filter(|period| period.start > now)
        .map(|period| period.start - now)
        .min();
    let last_end = applicable
        .iter()
        .filter(|period| period.end <= now)
        .map(|period| now - period.end)
        .min();
    match (next_start, last_end) {
        (Some(until_start), Some(since_end)) => {
            if until_start <= since_end {
                WindowStatus::ClosedBefore
            } else {
                WindowStatus::ClosedAfter
            }
        }
        (Some(_), None) => WindowStatus::ClosedBefore,
        (None, Some(_)) => WindowStatus::ClosedAfter,
        (None, None) => WindowStatus::Inactive,
    }
}
