//! Token storage trait and the in-memory backend used by the proxy.

use async_trait::async_trait;
use dashmap::DashMap;

use super::TokenRecord;
use crate::error::Error;

/// Trait for storing and retrieving token records.
///
/// Records are keyed by an auth context id (one per browser session) and a
/// provider id, so concurrent users never share tokens.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store a record, replacing any previous record in a single write.
    async fn store(&self, context_id: &str, provider_id: &str, record: TokenRecord)
        -> Result<(), Error>;

    /// Retrieve the record for a context and provider.
    async fn get(&self, context_id: &str, provider_id: &str) -> Result<Option<TokenRecord>, Error>;

    /// Remove the record for a context and provider.
    async fn delete(&self, context_id: &str, provider_id: &str) -> Result<(), Error>;

    /// Remove the records of every provider for a context.
    async fn delete_context(&self, context_id: &str) -> Result<(), Error>;
}

/// Process-memory storage. Everything is lost on restart.
#[derive(Default)]
pub struct MemoryStorage {
    records: DashMap<(String, String), TokenRecord>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(context_id: &str, provider_id: &str) -> (String, String) {
        (context_id.to_string(), provider_id.to_string())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn store(
        &self,
        context_id: &str,
        provider_id: &str,
        record: TokenRecord,
    ) -> Result<(), Error> {
        self.records
            .insert(Self::key(context_id, provider_id), record);
        Ok(())
    }

    async fn get(&self, context_id: &str, provider_id: &str) -> Result<Option<TokenRecord>, Error> {
        Ok(self
            .records
            .get(&Self::key(context_id, provider_id))
            .map(|entry| entry.value().clone()))
    }

    async fn delete(&self, context_id: &str, provider_id: &str) -> Result<(), Error> {
        self.records.remove(&Self::key(context_id, provider_id));
        Ok(())
    }

    async fn delete_context(&self, context_id: &str) -> Result<(), Error> {
        self.records.retain(|(context, _), _| context != context_id);
        Ok(())
    }
}
