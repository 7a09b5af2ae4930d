//! CRM record pass-through: contacts, leads and accounts.
//!
//! Each operation is translated into the provider's REST call, issued through
//! the token manager (so a 401 gets one refresh-and-retry) and the provider's
//! status and JSON body are handed back unchanged.

use std::fmt;
use std::str::FromStr;

use crate::error::{AuthErrorKind, Error, InternalErrorKind, InvalidErrorKind};
use crate::gateway::crm;
use crm_auth::http::{ApiRequest, ProviderResponse};
use crm_auth::oauth::ProviderKind;
use log::*;
use serde_json::{json, Value};
use service::AppState;

pub const DEFAULT_LIST_LIMIT: u32 = 10;
pub const MAX_LIST_LIMIT: u32 = 200;
const MAX_RECORD_ID_LEN: usize = 64;

/// Record types exposed under `/api/{provider}/{object}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrmObject {
    Contacts,
    Leads,
    Accounts,
}

impl CrmObject {
    /// Salesforce sObject name.
    fn sobject(&self) -> &'static str {
        match self {
            CrmObject::Contacts => "Contact",
            CrmObject::Leads => "Lead",
            CrmObject::Accounts => "Account",
        }
    }

    fn soql_fields(&self) -> &'static str {
        match self {
            CrmObject::Contacts => "Id, FirstName, LastName, Email, Phone, Title, AccountId",
            CrmObject::Leads => "Id, FirstName, LastName, Email, Company, Status",
            CrmObject::Accounts => "Id, Name, Industry, Website, Phone",
        }
    }

    /// HubSpot object type; accounts are HubSpot companies.
    fn hubspot_object(&self) -> &'static str {
        match self {
            CrmObject::Contacts => "contacts",
            CrmObject::Leads => "leads",
            CrmObject::Accounts => "companies",
        }
    }

    fn hubspot_properties(&self) -> &'static str {
        match self {
            CrmObject::Contacts => "firstname,lastname,email,phone,company,jobtitle",
            CrmObject::Leads => "hs_lead_name,hs_pipeline_stage,hs_lead_type",
            CrmObject::Accounts => "name,domain,industry,phone,website",
        }
    }
}

impl FromStr for CrmObject {
    type Err = Error;

    fn from_str(object: &str) -> Result<Self, Self::Err> {
        match object {
            "contacts" => Ok(CrmObject::Contacts),
            "leads" => Ok(CrmObject::Leads),
            "accounts" => Ok(CrmObject::Accounts),
            _ => Err(Error::internal(InternalErrorKind::Invalid(
                InvalidErrorKind::UnknownObject,
            ))),
        }
    }
}

impl fmt::Display for CrmObject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            CrmObject::Contacts => "contacts",
            CrmObject::Leads => "leads",
            CrmObject::Accounts => "accounts",
        })
    }
}

/// A record id that is safe to splice into a provider URL path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordId(String);

impl RecordId {
    pub fn parse(id: &str) -> Result<Self, Error> {
        let valid = !id.is_empty()
            && id.len() <= MAX_RECORD_ID_LEN
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

        if valid {
            Ok(RecordId(id.to_string()))
        } else {
            Err(Error::internal(InternalErrorKind::Invalid(
                InvalidErrorKind::RecordId,
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    List { limit: u32 },
    Read { id: RecordId },
    Create { body: Value },
    Update { id: RecordId, body: Value },
    Delete { id: RecordId },
}

/// Clamp a requested page size to `1..=MAX_LIST_LIMIT`.
pub fn list_limit(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT)
}

/// Provider status and body, ready to be returned to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordResponse {
    pub status: u16,
    pub body: Value,
}

impl From<ProviderResponse> for RecordResponse {
    fn from(response: ProviderResponse) -> Self {
        if response.payload.is_empty() {
            return RecordResponse {
                status: 200,
                body: json!({ "success": true }),
            };
        }

        RecordResponse {
            status: response.status.as_u16(),
            body: response.payload.into_value(),
        }
    }
}

/// Run one CRUD operation for the caller's auth context.
pub async fn execute(
    app_state: &AppState,
    kind: ProviderKind,
    context_id: Option<&str>,
    object: CrmObject,
    operation: Operation,
) -> Result<RecordResponse, Error> {
    let provider = crm::new_provider(&app_state.config, &app_state.http_client, kind)?;
    let context_id = context_id.ok_or_else(|| {
        Error::internal(InternalErrorKind::Auth(AuthErrorKind::NotAuthenticated))
    })?;
    let request = build_request(kind, &app_state.config.sf_api_version, object, operation);

    debug!(
        "Proxying {} {} to {}",
        request.method,
        request.path,
        kind.display_name()
    );

    let response = app_state
        .token_manager()
        .execute(provider.as_ref(), context_id, &request)
        .await
        .inspect_err(|e| warn!("{} {object} request failed: {e}", kind.display_name()))?;

    Ok(response.into())
}

/// Translate an operation into the provider's REST call.
pub fn build_request(
    kind: ProviderKind,
    sf_api_version: &str,
    object: CrmObject,
    operation: Operation,
) -> ApiRequest {
    match kind {
        ProviderKind::Salesforce => salesforce_request(sf_api_version, object, operation),
        ProviderKind::Hubspot => hubspot_request(object, operation),
    }
}

fn salesforce_request(api_version: &str, object: CrmObject, operation: Operation) -> ApiRequest {
    let data = format!("/services/data/{api_version}");
    let sobjects = format!("{data}/sobjects/{}", object.sobject());

    match operation {
        Operation::List { limit } => ApiRequest::get(format!("{data}/query")).with_query(
            "q",
            format!(
                "SELECT {} FROM {} LIMIT {limit}",
                object.soql_fields(),
                object.sobject()
            ),
        ),
        Operation::Read { id } => ApiRequest::get(format!("{sobjects}/{}", id.as_str())),
        Operation::Create { body } => ApiRequest::post(sobjects).with_json(body),
        Operation::Update { id, body } => {
            ApiRequest::patch(format!("{sobjects}/{}", id.as_str())).with_json(body)
        }
        Operation::Delete { id } => ApiRequest::delete(format!("{sobjects}/{}", id.as_str())),
    }
}

fn hubspot_request(object: CrmObject, operation: Operation) -> ApiRequest {
    let objects = format!("/crm/v3/objects/{}", object.hubspot_object());

    match operation {
        Operation::List { limit } => ApiRequest::get(objects)
            .with_query("limit", limit.to_string())
            .with_query("properties", object.hubspot_properties()),
        Operation::Read { id } => ApiRequest::get(format!("{objects}/{}", id.as_str()))
            .with_query("properties", object.hubspot_properties()),
        Operation::Create { body } => ApiRequest::post(objects).with_json(hubspot_properties(body)),
        Operation::Update { id, body } => {
            ApiRequest::patch(format!("{objects}/{}", id.as_str())).with_json(hubspot_properties(body))
        }
        Operation::Delete { id } => ApiRequest::delete(format!("{objects}/{}", id.as_str())),
    }
}

/// HubSpot expects `{"properties": {...}}`; flat bodies are wrapped.
fn hubspot_properties(body: Value) -> Value {
    match body.get("properties") {
        Some(properties) if properties.is_object() => body,
        _ => json!({ "properties": body }),
    }
}
