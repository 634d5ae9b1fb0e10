use ao_core::conflict::Conflict;
use ao_core::error::{CopyError, LaunchError, RosterError, SettingsError, WindowError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("{0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Unsupported(String),
    #[error("{message}")]
    Conflict {
        message: String,
        conflicts: Vec<Conflict>,
    },
    #[error("{0}")]
    Internal(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON body of every failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<Conflict>,
}

impl WebError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::NotFound(_) => StatusCode::NOT_FOUND,
            // The UI renders `unsupported` as an informational state.
            WebError::Unsupported(_) => StatusCode::OK,
            WebError::Conflict { .. } => StatusCode::CONFLICT,
            WebError::Internal(_) | WebError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        let status = match self {
            WebError::Unsupported(_) => "unsupported",
            _ => "error",
        };
        let conflicts = match self {
            WebError::Conflict { conflicts, .. } => conflicts.clone(),
            _ => Vec::new(),
        };
        ErrorBody {
            status: status.to_string(),
            message: self.to_string(),
            conflicts,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let code = self.status_code();
        if code.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = %code, "request rejected");
        }
        (code, Json(self.body())).into_response()
    }
}

impl From<RosterError> for WebError {
    fn from(err: RosterError) -> Self {
        match err {
            RosterError::AccountOutOfRange { .. } | RosterError::CharacterOutOfRange { .. } => {
                WebError::NotFound(err.to_string())
            }
            _ => WebError::BadRequest(err.to_string()),
        }
    }
}

impl From<LaunchError> for WebError {
    fn from(err: LaunchError) -> Self {
        match err {
            LaunchError::Validation(message) => WebError::BadRequest(message),
            LaunchError::Unsupported(message) => WebError::Unsupported(message),
            LaunchError::Platform(message) => WebError::Internal(message),
            LaunchError::NothingToLaunch { ref conflicts } => WebError::Conflict {
                message: err.to_string(),
                conflicts: conflicts.clone(),
            },
            LaunchError::CloseFailed { .. } => WebError::Conflict {
                message: err.to_string(),
                conflicts: Vec::new(),
            },
        }
    }
}

impl From<WindowError> for WebError {
    fn from(err: WindowError) -> Self {
        match err {
            WindowError::Unsupported(message) => WebError::Unsupported(message),
            WindowError::Failed(message) => WebError::Internal(message),
        }
    }
}

impl From<CopyError> for WebError {
    fn from(err: CopyError) -> Self {
        match err {
            CopyError::SourceMissing { .. } => WebError::NotFound(err.to_string()),
            _ => WebError::BadRequest(err.to_string()),
        }
    }
}

impl From<SettingsError> for WebError {
    fn from(err: SettingsError) -> Self {
        WebError::Internal(err.to_string())
    }
}
