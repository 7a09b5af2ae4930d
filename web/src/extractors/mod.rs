pub(crate) mod auth_context;

use axum::http::StatusCode;

type RejectionType = (StatusCode, String);
