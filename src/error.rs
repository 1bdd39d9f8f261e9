use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures raised by a graph-store adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Graph store unavailable: {0}")]
    Unavailable(String),

    #[error("Graph store call timed out after {0}ms")]
    Timeout(u64),

    #[error("Node not found: {0}")]
    MissingNode(String),

    #[error("Edge not found: {0}")]
    MissingEdge(String),

    #[error("Node already exists: {0}")]
    DuplicateNode(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the preference and recommendation engines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<StoreError> for RecError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingNode(key) | StoreError::MissingEdge(key) => RecError::NotFound(key),
            StoreError::DuplicateNode(key) => RecError::Conflict(key),
            other => RecError::StoreUnavailable(other.to_string()),
        }
    }
}

impl RecError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RecError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            RecError::NotFound(_) => StatusCode::NOT_FOUND,
            RecError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RecError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for RecError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "success": false,
            "data": null,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type RecResult<T> = Result<T, RecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_mapping() {
        assert!(matches!(
            RecError::from(StoreError::MissingNode("Movie:m1".to_string())),
            RecError::NotFound(_)
        ));
        assert!(matches!(
            RecError::from(StoreError::Timeout(50)),
            RecError::StoreUnavailable(_)
        ));
        assert!(matches!(
            RecError::from(StoreError::DuplicateNode("User:u1".to_string())),
            RecError::Conflict(_)
        ));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            RecError::InvalidArgument("limit".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RecError::StoreUnavailable("down".to_string()).into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
