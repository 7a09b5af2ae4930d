use crate::extractors::RejectionType;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use log::*;
use tower_sessions::Session;
use uuid::Uuid;

/// Session key holding the browser's auth context id.
pub(crate) const AUTH_CONTEXT_KEY: &str = "auth_context_id";

/// The auth context of the calling browser session, issued if missing.
///
/// Token records are keyed by this id, so each browser session sees only its
/// own tokens. Only handlers that start a login use this extractor; everything
/// else reads the context with [`SessionContext`] and never creates a session.
pub(crate) struct AuthContext {
    pub id: String,
    pub session: Session,
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = RejectionType;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(status, msg)| (status, msg.to_string()))?;

        let existing = session
            .get::<String>(AUTH_CONTEXT_KEY)
            .await
            .map_err(session_rejection)?;

        let id = match existing {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                session
                    .insert(AUTH_CONTEXT_KEY, &id)
                    .await
                    .map_err(session_rejection)?;
                debug!("Issued auth context {id}");
                id
            }
        };

        Ok(AuthContext { id, session })
    }
}

/// The auth context of the calling browser session, if it ever logged in.
pub(crate) struct SessionContext {
    pub id: Option<String>,
    pub session: Session,
}

impl SessionContext {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = RejectionType;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(status, msg)| (status, msg.to_string()))?;

        let id = session
            .get::<String>(AUTH_CONTEXT_KEY)
            .await
            .map_err(session_rejection)?;

        Ok(SessionContext { id, session })
    }
}

fn session_rejection(err: tower_sessions::session::Error) -> RejectionType {
    warn!("Failed to load auth context from session: {err:?}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Session storage failed".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    async fn context_id(context: AuthContext) -> String {
        context.id
    }

    async fn existing_context_id(context: SessionContext) -> String {
        context.id.unwrap_or_else(|| "none".to_string())
    }

    fn app() -> Router {
        Router::new()
            .route("/context", get(context_id))
            .route("/existing", get(existing_context_id))
            .layer(SessionManagerLayer::new(MemoryStore::default()).with_secure(false))
    }

    fn session_cookie(response: &axum::response::Response) -> String {
        response
            .headers()
            .get("set-cookie")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .unwrap()
            .to_string()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_context_is_stable_within_a_session() {
        let app = app();

        let first = app
            .clone()
            .oneshot(Request::builder().uri("/context").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let cookie = session_cookie(&first);
        let first_id = body_string(first).await;

        let second = app
            .oneshot(
                Request::builder()
                    .uri("/context")
                    .header("cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_string(second).await, first_id);
        assert!(Uuid::parse_str(&first_id).is_ok());
    }

    #[tokio::test]
    async fn test_sessions_get_distinct_contexts() {
        let app = app();

        let first = app
            .clone()
            .oneshot(Request::builder().uri("/context").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let second = app
            .oneshot(Request::builder().uri("/context").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_ne!(body_string(first).await, body_string(second).await);
    }

    #[tokio::test]
    async fn test_lookup_without_session_creates_nothing() {
        let response = app()
            .oneshot(Request::builder().uri("/existing").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.headers().get("set-cookie").is_none());
        assert_eq!(body_string(response).await, "none");
    }

    #[tokio::test]
    async fn test_lookup_reads_issued_context() {
        let app = app();

        let issued = app
            .clone()
            .oneshot(Request::builder().uri("/context").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let cookie = session_cookie(&issued);
        let issued_id = body_string(issued).await;

        let looked_up = app
            .oneshot(
                Request::builder()
                    .uri("/existing")
                    .header("cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(body_string(looked_up).await, issued_id);
    }
}
