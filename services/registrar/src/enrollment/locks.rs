//! Per-course exclusive lock registry.
//!
//! # Purpose
//! Serializes enrollment transactions against a single course while letting
//! requests for different courses proceed in parallel. The engine holds the
//! returned guard across every read and mutation of a course's roster and
//! waitlist state, including the audit append.
//!
//! # Notes
//! Acquisition is bounded; a timeout surfaces to the caller as `ServiceBusy`
//! rather than queueing indefinitely behind a stuck transaction.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Default bound on lock acquisition; overridable through configuration.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Acquisition timed out; the caller may retry.
#[derive(Debug)]
pub struct LockTimeout;

pub struct CourseLocks {
    timeout: Duration,
    /// One mutex per course id, created lazily on first use. Entries are
    /// never removed; the set of courses is small and bounded.
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CourseLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the exclusive lock for `course_id`, waiting at most the
    /// configured timeout. The guard is owned so it can be held across await
    /// points for the full transaction.
    pub async fn acquire(&self, course_id: &str) -> Result<OwnedMutexGuard<()>, LockTimeout> {
        let entry = {
            let mut registry = self.inner.lock().await;
            registry
                .entry(course_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        tokio::time::timeout(self.timeout, entry.lock_owned())
            .await
            .map_err(|_| LockTimeout)
    }
}
