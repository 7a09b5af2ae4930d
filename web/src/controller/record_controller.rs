use crate::error::invalid_body;
use crate::extractors::auth_context::SessionContext;
use crate::{AppState, Error};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domain::record::{self, CrmObject, Operation, RecordId, RecordResponse};
use domain::ProviderKind;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct IndexParams {
    pub limit: Option<u32>,
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, Error> {
    body.map(|Json(body)| body).map_err(invalid_body)
}

fn respond(response: RecordResponse) -> impl IntoResponse {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
    (status, Json(response.body))
}

/// GET /api/{provider}/{object}
pub async fn index(
    State(app_state): State<AppState>,
    Extension(kind): Extension<ProviderKind>,
    context: SessionContext,
    Path(object): Path<String>,
    Query(params): Query<IndexParams>,
) -> Result<impl IntoResponse, Error> {
    let object: CrmObject = object.parse()?;
    let operation = Operation::List {
        limit: record::list_limit(params.limit),
    };

    let response = record::execute(&app_state, kind, context.id(), object, operation).await?;
    Ok(respond(response))
}

/// GET /api/{provider}/{object}/{id}
pub async fn read(
    State(app_state): State<AppState>,
    Extension(kind): Extension<ProviderKind>,
    context: SessionContext,
    Path((object, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, Error> {
    let object: CrmObject = object.parse()?;
    let id = RecordId::parse(&id)?;

    let response =
        record::execute(&app_state, kind, context.id(), object, Operation::Read { id }).await?;
    Ok(respond(response))
}

/// POST /api/{provider}/{object}
pub async fn create(
    State(app_state): State<AppState>,
    Extension(kind): Extension<ProviderKind>,
    context: SessionContext,
    Path(object): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let object: CrmObject = object.parse()?;
    let body = json_body(body)?;

    let response =
        record::execute(&app_state, kind, context.id(), object, Operation::Create { body }).await?;
    Ok(respond(response))
}

/// PUT or PATCH /api/{provider}/{object}/{id}
pub async fn update(
    State(app_state): State<AppState>,
    Extension(kind): Extension<ProviderKind>,
    context: SessionContext,
    Path((object, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let object: CrmObject = object.parse()?;
    let id = RecordId::parse(&id)?;
    let body = json_body(body)?;

    let response = record::execute(
        &app_state,
        kind,
        context.id(),
        object,
        Operation::Update { id, body },
    )
    .await?;
    Ok(respond(response))
}

/// DELETE /api/{provider}/{object}/{id}
pub async fn delete(
    State(app_state): State<AppState>,
    Extension(kind): Extension<ProviderKind>,
    context: SessionContext,
    Path((object, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, Error> {
    let object: CrmObject = object.parse()?;
    let id = RecordId::parse(&id)?;

    let response =
        record::execute(&app_state, kind, context.id(), object, Operation::Delete { id }).await?;
    Ok(respond(response))
}
