//! Token manager with per-context refresh locking.

use std::sync::Arc;

use dashmap::DashMap;
use log::*;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

use super::{AuthStatus, Storage, TokenRecord};
use crate::error::{api_error, token_error, Error, TokenErrorKind};
use crate::http::{ApiRequest, ProviderReply, ProviderResponse};
use crate::oauth::Provider;

/// Refresh-and-reissue attempts allowed for one API call after a 401.
pub const MAX_AUTH_RETRIES: usize = 1;

/// Token manager that owns every token record and coordinates refreshes.
///
/// Refreshes for the same auth context and provider are serialized. Without
/// locking, two requests rejected with the same access token would both hit
/// the token endpoint, and a provider that rotates refresh tokens would then
/// reject the second one.
pub struct Manager<S: Storage> {
    storage: S,
    refresh_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<S: Storage> Manager<S> {
    /// Create a new token manager with the given storage backend.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            refresh_locks: DashMap::new(),
        }
    }

    fn refresh_lock(&self, context_id: &str, provider_id: &str) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(lock_key(context_id, provider_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Replace the context's record once no refresh for it is in flight.
    async fn store_locked(
        &self,
        context_id: &str,
        provider_id: &str,
        record: TokenRecord,
    ) -> Result<(), Error> {
        let lock = self.refresh_lock(context_id, provider_id);
        let _guard = lock.lock().await;
        self.storage.store(context_id, provider_id, record).await
    }

    /// Exchange an authorization code and replace the context's record.
    ///
    /// On failure the existing record is left untouched.
    pub async fn complete_authorization<P: Provider + ?Sized>(
        &self,
        provider: &P,
        context_id: &str,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<AuthStatus, Error> {
        let grant = provider.exchange_code(code, code_verifier).await?;
        let record = TokenRecord::from_grant(grant);
        let status = record.status();

        self.store_locked(context_id, provider.provider().as_str(), record)
            .await?;

        info!(
            "Stored {} tokens for auth context {context_id}",
            provider.provider().display_name()
        );
        Ok(status)
    }

    /// Authenticate with the provider's password grant and replace the context's record.
    pub async fn password_login<P: Provider + ?Sized>(
        &self,
        provider: &P,
        context_id: &str,
    ) -> Result<AuthStatus, Error> {
        let grant = provider.password_grant().await?;
        let record = TokenRecord::from_grant(grant);
        let status = record.status();

        self.store_locked(context_id, provider.provider().as_str(), record)
            .await?;

        info!(
            "Stored {} password-grant tokens for auth context {context_id}",
            provider.provider().display_name()
        );
        Ok(status)
    }

    /// Refresh the access token on request.
    ///
    /// Fails with `NoRefreshToken` without any network call when no refresh
    /// token is stored. A rejected refresh leaves the record as it was.
    pub async fn refresh<P: Provider + ?Sized>(
        &self,
        provider: &P,
        context_id: &str,
    ) -> Result<AuthStatus, Error> {
        let provider_id = provider.provider().as_str();
        let lock = self.refresh_lock(context_id, provider_id);
        let _guard = lock.lock().await;

        let record = self.storage.get(context_id, provider_id).await?;
        let record = self.refresh_record(provider, context_id, record).await?;
        Ok(record.status())
    }

    /// Refresh after `rejected` was answered with a 401.
    ///
    /// If another request already replaced the rejected token while this one
    /// waited for the lock, the stored record is returned without a network call.
    async fn refresh_rejected<P: Provider + ?Sized>(
        &self,
        provider: &P,
        context_id: &str,
        rejected: &SecretString,
    ) -> Result<TokenRecord, Error> {
        let provider_id = provider.provider().as_str();
        let lock = self.refresh_lock(context_id, provider_id);
        let _guard = lock.lock().await;

        let record = self
            .storage
            .get(context_id, provider_id)
            .await?
            .ok_or_else(|| {
                token_error(TokenErrorKind::NotAuthenticated, "Tokens removed during refresh")
            })?;

        if record.access_token.expose_secret() != rejected.expose_secret() {
            debug!("Access token for auth context {context_id} was refreshed by another request");
            return Ok(record);
        }

        self.refresh_record(provider, context_id, Some(record)).await
    }

    /// Must be called with the refresh lock held.
    async fn refresh_record<P: Provider + ?Sized>(
        &self,
        provider: &P,
        context_id: &str,
        record: Option<TokenRecord>,
    ) -> Result<TokenRecord, Error> {
        let no_refresh_token =
            || token_error(TokenErrorKind::NoRefreshToken, "No refresh token available");
        let mut record = record.ok_or_else(no_refresh_token)?;
        let refresh_token = record.refresh_token.clone().ok_or_else(no_refresh_token)?;

        let grant = provider
            .refresh_token(refresh_token.expose_secret())
            .await?;

        record.apply_refresh(grant);
        self.storage
            .store(context_id, provider.provider().as_str(), record.clone())
            .await?;

        debug!(
            "Refreshed {} access token for auth context {context_id}",
            provider.provider().display_name()
        );
        Ok(record)
    }

    /// Issue an API call with the context's access token.
    ///
    /// A 401 triggers at most `MAX_AUTH_RETRIES` refresh-and-reissue rounds.
    /// Every other failure, including a failed refresh, is returned as is.
    /// A failed refresh leaves the stale record in place.
    pub async fn execute<P: Provider + ?Sized>(
        &self,
        provider: &P,
        context_id: &str,
        request: &ApiRequest,
    ) -> Result<ProviderResponse, Error> {
        let provider_id = provider.provider().as_str();
        let mut record = self
            .storage
            .get(context_id, provider_id)
            .await?
            .ok_or_else(|| {
                token_error(
                    TokenErrorKind::NotAuthenticated,
                    "Not authenticated with this provider",
                )
            })?;

        let mut retries = 0;
        loop {
            match provider.send(request, &record).await? {
                ProviderReply::Success(response) => return Ok(response),
                ProviderReply::Unauthorized(fault) if retries < MAX_AUTH_RETRIES => {
                    retries += 1;
                    info!(
                        "{} rejected access token for {} {} ({}), refreshing",
                        provider.provider().display_name(),
                        request.method,
                        request.path,
                        fault.code
                    );
                    record = self
                        .refresh_rejected(provider, context_id, &record.access_token)
                        .await
                        .inspect_err(|e| warn!("Refresh after 401 failed: {e}"))?;
                }
                ProviderReply::Unauthorized(fault) | ProviderReply::Failure(fault) => {
                    debug!(
                        "{} {} failed: {fault}",
                        request.method, request.path
                    );
                    return Err(api_error(fault));
                }
            }
        }
    }

    /// Report whether the context holds a token record; never touches the network.
    pub async fn status(&self, context_id: &str, provider_id: &str) -> Result<AuthStatus, Error> {
        Ok(self
            .storage
            .get(context_id, provider_id)
            .await?
            .map(|record| record.status())
            .unwrap_or_else(AuthStatus::unauthenticated))
    }

    /// Forget the context's tokens. Nothing is revoked at the provider.
    ///
    /// Waits for an in-flight refresh, so the record cannot be stored again
    /// after it was deleted.
    pub async fn logout(&self, context_id: &str, provider_id: &str) -> Result<(), Error> {
        let lock = self.refresh_lock(context_id, provider_id);
        let _guard = lock.lock().await;

        self.storage.delete(context_id, provider_id).await?;
        info!("Cleared {provider_id} tokens for auth context {context_id}");
        Ok(())
    }

    /// Drop every record and refresh lock of an auth context whose session is gone.
    pub async fn forget_context(&self, context_id: &str) -> Result<(), Error> {
        let prefix = lock_key(context_id, "");
        let locks: Vec<Arc<Mutex<()>>> = self
            .refresh_locks
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .map(|entry| entry.value().clone())
            .collect();

        let mut guards = Vec::with_capacity(locks.len());
        for lock in &locks {
            guards.push(lock.lock().await);
        }

        self.storage.delete_context(context_id).await?;
        self.refresh_locks.retain(|key, _| !key.starts_with(&prefix));
        debug!("Forgot expired auth context {context_id}");
        Ok(())
    }

    /// Store a record directly, replacing any previous one.
    pub async fn store_record(
        &self,
        context_id: &str,
        provider_id: &str,
        record: TokenRecord,
    ) -> Result<(), Error> {
        self.storage.store(context_id, provider_id, record).await
    }

    /// Get the stored record (may be expired).
    pub async fn get_record(
        &self,
        context_id: &str,
        provider_id: &str,
    ) -> Result<Option<TokenRecord>, Error> {
        self.storage.get(context_id, provider_id).await
    }
}

fn lock_key(context_id: &str, provider_id: &str) -> String {
    format!("{context_id}:{provider_id}")
}
