//! OAuth 2.0 authentication infrastructure.
//!
//! Authorization-code flows (with PKCE where the provider supports it) for the
//! CRM platforms the proxy fronts.

mod pkce;
mod provider;
mod state;

pub mod providers;
pub mod token;

pub use pkce::{PkceChallenge, PkceVerifier, CHALLENGE_METHOD};
pub use provider::{
    decode_oauth_fault, AuthorizationRequest, OAuthClientConfig, Provider, ProviderKind,
};
pub use state::{generate_state, redeem_pending, PendingAuthorization, DEFAULT_STATE_TTL_MINUTES};
