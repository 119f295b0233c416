//! Error types for the HTTP layer.
//!
//! [`DispatchError`] covers everything a live request can fail with and
//! converts into a JSON response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use streamview_core::{ActorError, SessionIdError, ViewError};

/// Errors that can occur while dispatching a live request.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No session id in the path, client signals, or query.
    #[error("missing session id")]
    MissingSessionId,

    /// The supplied session id is malformed.
    #[error("invalid session id: {0}")]
    InvalidSessionId(#[from] SessionIdError),

    /// The event name is empty.
    #[error("missing event name")]
    MissingEvent,

    /// The query string could not be decoded.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// No running session has this id.
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// The view is transient and has no stream endpoint.
    #[error("view `{0}` is not live")]
    NotLive(String),

    /// The session actor is gone.
    #[error("session error: {0}")]
    Session(#[from] ActorError),

    /// A view callback failed or panicked.
    #[error("handler error: {0}")]
    Handler(String),
}

impl From<ViewError> for DispatchError {
    fn from(e: ViewError) -> Self {
        Self::Handler(e.to_string())
    }
}

impl From<QueryRejection> for DispatchError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidQuery(rejection.body_text())
    }
}

impl DispatchError {
    /// The HTTP status this error maps to.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingSessionId
            | Self::InvalidSessionId(_)
            | Self::MissingEvent
            | Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::UnknownSession(_) | Self::NotLive(_) => StatusCode::NOT_FOUND,
            Self::Session(_) => StatusCode::GONE,
            Self::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

/// Errors that can occur when bringing the process up.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// The log subscriber could not be installed.
    #[error("logging error: {0}")]
    Logging(String),

    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use axum::extract::Query;

    use super::*;

    #[test]
    fn client_errors_are_bad_request() {
        assert_eq!(DispatchError::MissingSessionId.status(), StatusCode::BAD_REQUEST);
        assert_eq!(DispatchError::MissingEvent.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            DispatchError::InvalidSessionId(SessionIdError::Empty).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn lifecycle_errors_map_to_not_found_and_gone() {
        assert_eq!(
            DispatchError::UnknownSession("abc".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(DispatchError::NotLive("clock".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            DispatchError::Session(ActorError::Terminated).status(),
            StatusCode::GONE
        );
    }

    #[test]
    fn view_errors_become_handler_errors() {
        let err = DispatchError::from(ViewError::Failed("boom".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "handler error: boom");
    }

    #[tokio::test]
    async fn query_rejection_keeps_the_json_error_shape() {
        let uri = "/counter?count=many".parse().unwrap();
        let rejection = Query::<HashMap<String, u8>>::try_from_uri(&uri).unwrap_err();

        let err = DispatchError::from(rejection);
        assert!(err.to_string().starts_with("invalid query: "));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], 400);
        assert!(body["error"].as_str().unwrap().starts_with("invalid query"));
    }
}
