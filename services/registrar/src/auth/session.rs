//! Session and token-revocation KV capability.
//!
//! # Purpose
//! Pluggable store for the token revocation set and per-user session
//! bookkeeping. The capability is optional: when unconfigured the null object
//! is wired in and authentication proceeds without revocation or session
//! tracking. Callers treat errors as degraded mode (warn and continue), so
//! an unreachable KV never blocks authentication.
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tokio::sync::RwLock;

/// At most this many live sessions are tracked per user; the oldest entry is
/// evicted when the limit is reached.
pub const MAX_SESSIONS_PER_USER: usize = 3;

/// Sessions idle longer than this are considered dead.
pub const SESSION_IDLE_TIMEOUT_MINUTES: i64 = 30;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SessionKv: Send + Sync {
    /// Whether the token id is in the revocation set.
    async fn is_revoked(&self, jti: &str) -> Result<bool, KvError>;
    /// Add a token id to the revocation set.
    async fn revoke(&self, jti: &str) -> Result<(), KvError>;
    /// Record activity for `(user_id, jti)`: refreshes the last-activity
    /// timestamp, prunes idle sessions, and bounds the live-session count.
    async fn touch_session(&self, user_id: &str, jti: &str, now: DateTime<Utc>)
        -> Result<(), KvError>;
    fn backend_name(&self) -> &'static str;
}

/// Null object wired in when no KV is configured. Nothing is revoked and no
/// sessions are tracked.
pub struct NullSessionKv;

#[async_trait]
impl SessionKv for NullSessionKv {
    async fn is_revoked(&self, _jti: &str) -> Result<bool, KvError> {
        Ok(false)
    }

    async fn revoke(&self, _jti: &str) -> Result<(), KvError> {
        Ok(())
    }

    async fn touch_session(
        &self,
        _user_id: &str,
        _jti: &str,
        _now: DateTime<Utc>,
    ) -> Result<(), KvError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "null"
    }
}

/// In-process KV for single-instance deployments and tests.
#[derive(Default)]
pub struct InMemorySessionKv {
    revoked: RwLock<HashSet<String>>,
    /// Live sessions per user ordered by insertion; `(jti, last_activity)`.
    sessions: RwLock<HashMap<String, Vec<(String, DateTime<Utc>)>>>,
}

impl InMemorySessionKv {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    async fn live_sessions(&self, user_id: &str) -> Vec<String> {
        self.sessions
            .read()
            .await
            .get(user_id)
            .map(|entries| entries.iter().map(|(jti, _)| jti.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionKv for InMemorySessionKv {
    async fn is_revoked(&self, jti: &str) -> Result<bool, KvError> {
        Ok(self.revoked.read().await.contains(jti))
    }

    async fn revoke(&self, jti: &str) -> Result<(), KvError> {
        self.revoked.write().await.insert(jti.to_string());
        Ok(())
    }

    async fn touch_session(
        &self,
        user_id: &str,
        jti: &str,
        now: DateTime<Utc>,
    ) -> Result<(), KvError> {
        let mut sessions = self.sessions.write().await;
        let entries = sessions.entry(user_id.to_string()).or_default();
        let idle_cutoff = now - Duration::minutes(SESSION_IDLE_TIMEOUT_MINUTES);
        entries.retain(|(_, last_activity)| *last_activity > idle_cutoff);

        if let Some(entry) = entries.iter_mut().find(|(id, _)| id == jti) {
            entry.1 = now;
            return Ok(());
        }
        // Bound the live set: evict the least recently active session.
        while entries.len() >= MAX_SESSIONS_PER_USER {
            if let Some(oldest) = entries
                .iter()
                .enumerate()
                .min_by_key(|(_, (_, last_activity))| *last_activity)
                .map(|(index, _)| index)
            {
                entries.remove(oldest);
            }
        }
        entries.push((jti.to_string(), now));
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
