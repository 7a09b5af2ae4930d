//! CSRF state and the pending authorization kept between login and callback.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::pkce::PkceVerifier;
use crate::error::{oauth_error, Error, OAuthErrorKind};

/// How long a login attempt may sit on the provider's consent page.
pub const DEFAULT_STATE_TTL_MINUTES: i64 = 10;

/// Data issued by `login` and consumed exactly once by `callback`.
///
/// Stored in the caller's server-side session; it never leaves the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub state: String,
    pub code_verifier: Option<String>,
    pub issued_at: DateTime<Utc>,
}

impl PendingAuthorization {
    /// Start a new attempt, generating a PKCE verifier when `use_pkce` is set.
    pub fn issue(use_pkce: bool) -> Self {
        Self {
            state: generate_state(),
            code_verifier: use_pkce.then(|| PkceVerifier::generate().into_string()),
            issued_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        Utc::now() > self.issued_at + ttl
    }

    /// Check the `state` returned by the provider against this attempt.
    ///
    /// Consumes the attempt either way; on success yields the PKCE verifier to
    /// send with the code exchange.
    pub fn redeem(self, returned_state: Option<&str>, ttl: Duration) -> Result<Option<String>, Error> {
        let returned_state = returned_state
            .ok_or_else(|| oauth_error(OAuthErrorKind::InvalidState, "state parameter missing"))?;

        if self.is_expired(ttl) {
            return Err(oauth_error(
                OAuthErrorKind::InvalidState,
                "authorization attempt expired",
            ));
        }

        if returned_state != self.state {
            return Err(oauth_error(
                OAuthErrorKind::InvalidState,
                "state parameter does not match",
            ));
        }

        Ok(self.code_verifier)
    }
}

/// Redeem whatever the session held; a missing attempt is a CSRF failure too.
pub fn redeem_pending(
    pending: Option<PendingAuthorization>,
    returned_state: Option<&str>,
) -> Result<Option<String>, Error> {
    match pending {
        Some(pending) => pending.redeem(
            returned_state,
            Duration::minutes(DEFAULT_STATE_TTL_MINUTES),
        ),
        None => Err(oauth_error(
            OAuthErrorKind::InvalidState,
            "no authorization in progress for this session",
        )),
    }
}

/// Generate a cryptographically random state token (32 bytes, hex encoded).
pub fn generate_state() -> String {
    let random_bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(random_bytes)
}
