//! OAuth token types.

use chrono::{DateTime, TimeDelta, Utc};
use log::*;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Token endpoint response, shared by every grant type.
///
/// Salesforce returns `instance_url` and omits `expires_in`; HubSpot returns
/// `expires_in` and never an instance URL.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub instance_url: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenGrant {
    /// `None` when the provider sent no `expires_in` or one too large to represent.
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        let seconds = self.expires_in?;
        let expires_at =
            TimeDelta::try_seconds(seconds).and_then(|ttl| Utc::now().checked_add_signed(ttl));
        if expires_at.is_none() {
            warn!("Ignoring out-of-range expires_in of {seconds} seconds");
        }
        expires_at
    }
}

/// Tokens held for one auth context and provider.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub instance_url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    /// Build a fresh record from a code exchange or password grant.
    pub fn from_grant(grant: TokenGrant) -> Self {
        let expires_at = grant.expires_at();
        Self {
            access_token: SecretString::from(grant.access_token),
            refresh_token: grant.refresh_token.map(SecretString::from),
            instance_url: grant.instance_url,
            expires_at,
        }
    }

    /// Merge a refresh response into this record.
    ///
    /// The refresh token is only replaced when the provider rotated it.
    pub fn apply_refresh(&mut self, grant: TokenGrant) {
        self.expires_at = grant.expires_at();
        self.access_token = SecretString::from(grant.access_token);
        if let Some(rotated) = grant.refresh_token {
            self.refresh_token = Some(SecretString::from(rotated));
        }
        if let Some(instance_url) = grant.instance_url {
            self.instance_url = Some(instance_url);
        }
    }

    pub fn status(&self) -> AuthStatus {
        AuthStatus {
            authenticated: true,
            has_refresh_token: self.refresh_token.is_some(),
            instance_url: self.instance_url.clone(),
            expires_at: self.expires_at,
        }
    }
}

/// What the status endpoint reports; never includes token values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub authenticated: bool,
    pub has_refresh_token: bool,
    pub instance_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthStatus {
    pub fn unauthenticated() -> Self {
        Self {
            authenticated: false,
            has_refresh_token: false,
            instance_url: None,
            expires_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use secrecy::ExposeSecret;

    fn grant(access: &str, refresh: Option<&str>, expires_in: Option<i64>) -> TokenGrant {
        TokenGrant {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            instance_url: None,
            expires_in,
        }
    }

    #[test]
    fn test_from_grant_computes_expiry() {
        let record = TokenRecord::from_grant(grant("T1", Some("R1"), Some(3600)));
        let remaining = record.expires_at.unwrap() - Utc::now();
        assert!(remaining > Duration::seconds(3590) && remaining <= Duration::seconds(3600));
    }

    #[test]
    fn test_from_grant_without_expiry() {
        let record = TokenRecord::from_grant(grant("T1", None, None));
        assert!(record.expires_at.is_none());
    }

    #[test]
    fn test_out_of_range_expiry_is_ignored() {
        let record = TokenRecord::from_grant(grant("T1", Some("R1"), Some(9_000_000_000_000_000)));
        assert!(record.expires_at.is_none());

        let record = TokenRecord::from_grant(grant("T1", Some("R1"), Some(i64::MIN)));
        assert!(record.expires_at.is_none());

        let mut refreshed = TokenRecord::from_grant(grant("T1", Some("R1"), Some(60)));
        refreshed.apply_refresh(grant("T2", None, Some(i64::MAX)));
        assert!(refreshed.expires_at.is_none());
        assert_eq!(refreshed.access_token.expose_secret(), "T2");
    }

    #[test]
    fn test_refresh_keeps_unrotated_refresh_token() {
        let mut record = TokenRecord::from_grant(grant("T1", Some("R1"), Some(60)));
        record.apply_refresh(grant("T2", None, Some(60)));

        assert_eq!(record.access_token.expose_secret(), "T2");
        assert_eq!(record.refresh_token.unwrap().expose_secret(), "R1");
    }

    #[test]
    fn test_refresh_takes_rotated_refresh_token() {
        let mut record = TokenRecord::from_grant(grant("T1", Some("R1"), None));
        record.apply_refresh(grant("T2", Some("R2"), None));

        assert_eq!(record.refresh_token.unwrap().expose_secret(), "R2");
    }

    #[test]
    fn test_refresh_keeps_instance_url_when_omitted() {
        let mut first = grant("T1", Some("R1"), None);
        first.instance_url = Some("https://org.example.com".to_string());
        let mut record = TokenRecord::from_grant(first);
        record.apply_refresh(grant("T2", None, None));

        assert_eq!(record.instance_url.as_deref(), Some("https://org.example.com"));
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let mut first = grant("T1", Some("R1"), None);
        first.instance_url = Some("https://org.example.com".to_string());
        let status = TokenRecord::from_grant(first).status();

        assert_eq!(
            serde_json::to_value(status).unwrap(),
            serde_json::json!({
                "authenticated": true,
                "hasRefreshToken": true,
                "instanceUrl": "https://org.example.com"
            })
        );
    }
}
