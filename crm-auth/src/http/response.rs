use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::error::{Error, ProviderFault};

/// A response body, read as text first and never assumed to be JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Empty body, e.g. `204 No Content`.
    Empty,
    Json(Value),
    /// Non-JSON body such as an HTML error page.
    Raw(String),
}

impl Payload {
    pub fn from_text(text: String) -> Self {
        if text.trim().is_empty() {
            return Payload::Empty;
        }
        match serde_json::from_str(&text) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Raw(text),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Payload::Empty => Value::Null,
            Payload::Json(value) => value,
            Payload::Raw(text) => json!({ "raw": text }),
        }
    }
}

/// A provider response of any status, before `classify` sorts it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub status: StatusCode,
    pub payload: Payload,
}

impl ProviderResponse {
    pub async fn read(response: reqwest::Response) -> Result<Self, Error> {
        let status = response.status();
        let text = response.text().await?;
        Ok(Self {
            status,
            payload: Payload::from_text(text),
        })
    }
}

/// Outcome of one provider call, decoded at the HTTP boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderReply {
    Success(ProviderResponse),
    /// 401: the only outcome the token manager may recover from.
    Unauthorized(ProviderFault),
    Failure(ProviderFault),
}

/// Fault built from the bare status line when the body carries nothing useful.
pub fn status_line_fault(status: StatusCode) -> ProviderFault {
    let reason = status.canonical_reason().unwrap_or("Unknown Status");
    let code = reason.to_uppercase().replace([' ', '-'], "_");
    ProviderFault::new(status.as_u16(), code, format!("{} {}", status.as_u16(), reason))
}
