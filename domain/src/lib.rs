//! Domain layer of the CRM proxy.
//!
//! Re-exports the `crm-auth` types `web` needs so that consumers of the
//! `domain` crate do not depend on `crm-auth` directly.
pub use crm_auth::oauth::token::AuthStatus;
pub use crm_auth::oauth::{AuthorizationRequest, PendingAuthorization, ProviderKind};

pub mod error;
pub mod oauth_connection;
pub mod record;

pub mod gateway;
