use std::path::PathBuf;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tokio::task::JoinError;
use validator::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Trying to create already created item {0}")]
    AlreadyExists(String),
    #[error("Requested item {0} not found")]
    NotFound(String),
    #[error("Authorization error for user \"{user}\": {reason}")]
    Unauthorized { user: String, reason: String },
    #[error("{0}")]
    Storage(#[from] StorageError),
    #[error("Mandatory argument is required but not provided: {0}")]
    MissingArgument(String),
    #[error("Tokio JoinError: {0}")]
    Join(#[from] JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to read credential store {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write credential store {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed credential store {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to encode credential store: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct ErrorJson {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error!("{}", self);

        let status = self.status_code();
        let code = self.code().map(str::to_owned);
        (
            status,
            Json(ErrorJson {
                error: self.to_string(),
                code,
            }),
        )
            .into_response()
    }
}

impl Error {
    pub fn unauthorized(user: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            user: user.into(),
            reason: reason.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::AlreadyExists(_) => StatusCode::CONFLICT,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::MissingArgument(_) => StatusCode::BAD_REQUEST,
            Error::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> Option<&'static str> {
        match self {
            Error::AlreadyExists(_) => Some("already_exists"),
            Error::NotFound(_) => Some("not_found"),
            Error::Unauthorized { .. } => Some("unauthorized"),
            Error::Storage(_) => Some("storage_error"),
            Error::MissingArgument(_) => Some("missing_argument"),
            Error::Join(_) => Some("internal_error"),
        }
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|field| field.to_string())
            .collect();
        fields.sort();
        Self::MissingArgument(fields.join(", "))
    }
}
