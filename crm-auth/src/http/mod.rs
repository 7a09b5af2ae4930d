//! HTTP plumbing shared by the OAuth providers: client building, outbound
//! request description and response decoding.

mod client;
mod request;
mod response;

pub use client::{HttpClientBuilder, HttpClientConfig};
pub use request::ApiRequest;
pub use response::{status_line_fault, Payload, ProviderReply, ProviderResponse};
