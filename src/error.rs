use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Status marker attached to transport-level failures.
pub const TRANSPORT_STATUS: u16 = 500;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected response from {path}: {detail}")]
    Protocol { path: String, detail: String },
    #[error("Invalid operation ({0})")]
    InvalidOperation(String),
    #[error("operation {cmd} requires {param}")]
    MissingParameter { cmd: String, param: &'static str },
    #[error("unknown cluster server {0}")]
    UnknownUpstream(String),
}

impl ApiError {
    /// HTTP-like status of the failure; transport errors carry a fixed 500.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Transport { .. } => TRANSPORT_STATUS,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Protocol { .. } => TRANSPORT_STATUS,
            ApiError::InvalidOperation(_) | ApiError::MissingParameter { .. } => 400,
            ApiError::UnknownUpstream(_) => 404,
        }
    }

    pub(crate) fn protocol(path: &str, detail: impl ToString) -> Self {
        ApiError::Protocol {
            path: path.to_string(),
            detail: detail.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match &self {
            ApiError::Transport { .. } | ApiError::Rejected { .. } | ApiError::Protocol { .. } => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::InvalidOperation(_) | ApiError::MissingParameter { .. } => {
                StatusCode::BAD_REQUEST
            }
            ApiError::UnknownUpstream(_) => StatusCode::NOT_FOUND,
        };
        (code, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
