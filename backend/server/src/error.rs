use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use show::{BuilderError, StoreError};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Missing or unknown user")]
    Unauthenticated,

    #[error("Administrator role required")]
    Forbidden,

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Episode {0} is not accepting predictions")]
    PredictionClosed(String),

    #[error("No prediction session open for episode {0}")]
    NoSession(String),

    #[error(transparent)]
    Builder(BuilderError),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl AppError {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        AppError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { kind, id } => AppError::NotFound { kind, id },
            other => AppError::Store(other),
        }
    }
}

impl From<BuilderError> for AppError {
    fn from(e: BuilderError) -> Self {
        match e {
            BuilderError::Roster(store) => store.into(),
            other => AppError::Builder(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::MalformedPayload { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } | AppError::NoSession { .. } => StatusCode::NOT_FOUND,
            AppError::PredictionClosed { .. } => StatusCode::CONFLICT,
            AppError::Builder(BuilderError::EmptyRoster | BuilderError::EmptyPrediction) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Builder(_) | AppError::Store(_) => StatusCode::BAD_GATEWAY,
        };

        if status.is_server_error() {
            error!("{self}");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (AppError::Forbidden, StatusCode::FORBIDDEN),
            (AppError::PredictionClosed("e1".into()), StatusCode::CONFLICT),
            (
                AppError::from(BuilderError::EmptyRoster),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::from(BuilderError::SaveFailed("timeout".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::from(StoreError::not_found("Episode", "e9")),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::from(BuilderError::Roster(StoreError::not_found("Episode", "e9"))),
                StatusCode::NOT_FOUND,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
