//! CRM OAuth providers.
//!
//! Builds configured Salesforce and HubSpot providers for domain operations.

use crm_auth::oauth::providers::{hubspot, salesforce};
use crm_auth::oauth::{OAuthClientConfig, Provider, ProviderKind};
use secrecy::SecretString;
use service::config::Config;

use crate::error::Error;

/// Create the provider for `kind` from config.
///
/// Fails with a configuration error, before any network call, when the
/// provider's client id or secret is missing.
pub fn new_provider(
    config: &Config,
    http_client: &reqwest::Client,
    kind: ProviderKind,
) -> Result<Box<dyn Provider>, Error> {
    let provider: Box<dyn Provider> = match kind {
        ProviderKind::Salesforce => Box::new(salesforce_provider(config, http_client)?),
        ProviderKind::Hubspot => Box::new(hubspot_provider(config, http_client)?),
    };
    Ok(provider)
}

pub fn salesforce_provider(
    config: &Config,
    http_client: &reqwest::Client,
) -> Result<salesforce::Provider, Error> {
    let client = OAuthClientConfig::new(
        config.sf_client_id(),
        config.sf_client_secret(),
        config.sf_redirect_uri.clone(),
        config.sf_scopes.clone(),
    )?;

    let password = match (config.sf_username(), config.sf_password()) {
        (Some(username), Some(password)) => Some(salesforce::PasswordCredentials {
            username,
            password: SecretString::from(password),
            security_token: config
                .sf_security_token()
                .filter(|token| !token.is_empty())
                .map(SecretString::from),
        }),
        _ => None,
    };

    Ok(salesforce::Provider::new(
        salesforce::Config {
            client,
            login_url: config.sf_login_url.clone(),
            password,
        },
        http_client.clone(),
    ))
}

pub fn hubspot_provider(
    config: &Config,
    http_client: &reqwest::Client,
) -> Result<hubspot::Provider, Error> {
    let client = OAuthClientConfig::new(
        config.hubspot_client_id(),
        config.hubspot_client_secret(),
        config.hubspot_redirect_uri.clone(),
        config.hubspot_scopes.clone(),
    )?;

    Ok(hubspot::Provider::new(
        hubspot::Config {
            client,
            auth_url: config.hubspot_auth_url.clone(),
            api_base_url: config.hubspot_api_base_url.clone(),
        },
        http_client.clone(),
    ))
}
