//! PKCE (Proof Key for Code Exchange) support for OAuth 2.0.
//!
//! Implements the S256 method of RFC 7636. Salesforce accepts PKCE on the
//! web-server flow; HubSpot does not, so callers only generate a pair when the
//! provider asks for it.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};

/// The only challenge method this crate sends.
pub const CHALLENGE_METHOD: &str = "S256";

/// PKCE code verifier: 32 random bytes, URL-safe base64 without padding (43 chars).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    pub fn generate() -> Self {
        let random_bytes: [u8; 32] = rand::thread_rng().gen();
        Self(URL_SAFE_NO_PAD.encode(random_bytes))
    }

    /// Rebuild a verifier previously stored in the session.
    pub fn from_string(verifier: String) -> Self {
        Self(verifier)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn challenge(&self) -> PkceChallenge {
        PkceChallenge::from_verifier(self)
    }
}

/// PKCE code challenge: base64url(SHA-256(verifier)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge(String);

impl PkceChallenge {
    pub fn from_verifier(verifier: &PkceVerifier) -> Self {
        let hash = Sha256::digest(verifier.as_str().as_bytes());
        Self(URL_SAFE_NO_PAD.encode(hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkce_verifier_is_43_url_safe_chars() {
        let verifier = PkceVerifier::generate();
        assert_eq!(verifier.as_str().len(), 43);
        assert!(verifier
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_pkce_verifiers_differ() {
        assert_ne!(PkceVerifier::generate(), PkceVerifier::generate());
    }

    #[test]
    fn test_pkce_challenge_known_value() {
        let verifier = PkceVerifier::from_string("verifier-123".to_string());
        assert_eq!(
            verifier.challenge().as_str(),
            "Ds3NpaREu9I2EYq6l0l3ZkFyv_Gt5O4EpGD6cZlY0Kg"
        );
    }
}
