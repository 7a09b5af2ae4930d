//! Provider implementations and the token-endpoint call they share.

pub mod hubspot;
pub mod salesforce;

use log::*;
use reqwest::header::ACCEPT;

use super::token::TokenGrant;
use super::provider::decode_oauth_fault;
use crate::error::{Error, ErrorKind, OAuthErrorKind, ProviderFault};
use crate::http::ProviderResponse;

/// POST a form-encoded grant to a token endpoint.
///
/// A non-success reply is mapped through `on_rejection`, carrying the
/// provider's own error code and description.
pub(crate) async fn request_token(
    client: &reqwest::Client,
    token_url: &str,
    form: &[(&str, &str)],
    on_rejection: fn(ProviderFault) -> OAuthErrorKind,
) -> Result<TokenGrant, Error> {
    let grant_type = form
        .iter()
        .find(|(key, _)| *key == "grant_type")
        .map(|(_, value)| *value)
        .unwrap_or("unknown");

    debug!("Requesting OAuth token ({grant_type}) from {token_url}");

    let response = client
        .post(token_url)
        .header(ACCEPT, "application/json")
        .form(form)
        .send()
        .await
        .inspect_err(|e| warn!("Token request ({grant_type}) did not complete: {e:?}"))?;
    let response = ProviderResponse::read(response).await?;

    if response.status.is_success() {
        serde_json::from_value::<TokenGrant>(response.payload.into_value()).map_err(|e| {
            warn!("Token response ({grant_type}) could not be parsed: {e}");
            Error {
                source: Some(Box::new(e)),
                error_kind: ErrorKind::OAuth(OAuthErrorKind::InvalidResponse),
            }
        })
    } else {
        let fault = decode_oauth_fault(response.status, &response.payload);
        warn!("Token request ({grant_type}) rejected: {fault}");
        Err(Error {
            source: None,
            error_kind: ErrorKind::OAuth(on_rejection(fault)),
        })
    }
}
