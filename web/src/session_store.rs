//! In-memory session store that can purge expired sessions.
//!
//! `tower_sessions::MemoryStore` only hides expired records on load and keeps
//! them forever. This store keeps the same semantics and adds
//! [`ExpiringMemoryStore::remove_expired`], which the server calls periodically so
//! the token records of abandoned auth contexts can be dropped with them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tower_sessions::session::{Id, Record};
use tower_sessions::{session_store, SessionStore};

use crate::extractors::auth_context::AUTH_CONTEXT_KEY;

#[derive(Clone, Debug, Default)]
pub struct ExpiringMemoryStore(Arc<Mutex<HashMap<Id, Record>>>);

impl ExpiringMemoryStore {
    /// Remove every expired session and return the auth context ids they held.
    pub async fn remove_expired(&self) -> Vec<String> {
        let now = OffsetDateTime::now_utc();
        let mut contexts = Vec::new();

        self.0.lock().await.retain(|_, record| {
            if is_active(record.expiry_date, now) {
                return true;
            }
            if let Some(context_id) = record.data.get(AUTH_CONTEXT_KEY).and_then(Value::as_str) {
                contexts.push(context_id.to_string());
            }
            false
        });

        contexts
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.0.lock().await.len()
    }
}

#[async_trait]
impl SessionStore for ExpiringMemoryStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        let mut sessions = self.0.lock().await;
        while sessions.contains_key(&record.id) {
            record.id = Id::default();
        }
        sessions.insert(record.id, record.clone());
        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.0.lock().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let now = OffsetDateTime::now_utc();
        Ok(self
            .0
            .lock()
            .await
            .get(session_id)
            .filter(|record| is_active(record.expiry_date, now))
            .cloned())
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.0.lock().await.remove(session_id);
        Ok(())
    }
}

fn is_active(expiry_date: OffsetDateTime, now: OffsetDateTime) -> bool {
    expiry_date > now
}
