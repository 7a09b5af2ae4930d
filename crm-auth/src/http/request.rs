use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::error::{ConfigErrorKind, Error, ErrorKind};

/// A provider API call, described independently of the base URL and token so
/// it can be re-issued after a refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the provider's API base, starting with `/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Resolve against a base such as `https://org.my.salesforce.com`.
    pub fn url(&self, base_url: &str) -> Result<Url, Error> {
        let mut url = Url::parse(&format!("{}{}", base_url.trim_end_matches('/'), self.path))
            .map_err(|e| Error {
                source: Some(Box::new(e)),
                error_kind: ErrorKind::Config(ConfigErrorKind::InvalidUrl),
            })?;

        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }

        Ok(url)
    }
}
