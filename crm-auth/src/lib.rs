//! # crm-auth
//!
//! Authentication for the CRM proxy:
//! - OAuth 2.0 authorization-code flows with CSRF state and PKCE
//! - Salesforce and HubSpot provider implementations
//! - Token records keyed by auth context, with serialized refresh
//! - Authenticated API calls with a single refresh-and-retry on 401
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crm_auth::{
//!     http::ApiRequest,
//!     oauth::{providers::salesforce, token::{Manager, MemoryStorage}},
//! };
//! ```

pub mod error;
pub mod http;
pub mod oauth;

// Re-export commonly used types
pub use error::{Error, ErrorKind};
