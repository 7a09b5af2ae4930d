//! HTTP client builder for provider calls.

use std::time::Duration;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("crm-auth/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Builder for the `reqwest::Client` every provider shares.
///
/// There is deliberately no retry middleware: the only retry in the proxy is
/// the single refresh-and-reissue done by the token manager on a 401.
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(self.config.timeout)
            .user_agent(self.config.user_agent)
            .build()
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_default() {
        let builder = HttpClientBuilder::new();
        assert_eq!(builder.config.timeout, Duration::from_secs(30));
        assert!(builder.config.user_agent.starts_with("crm-auth/"));
    }

    #[test]
    fn test_builder_with_timeout() {
        let builder = HttpClientBuilder::new().with_timeout(Duration::from_secs(5));
        assert_eq!(builder.config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_build_client() {
        assert!(HttpClientBuilder::new().build().is_ok());
    }
}
