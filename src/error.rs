use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use thiserror::Error;

/// Failures that end a request with an error response.
///
/// Attachment, media and per-step delivery failures never show up here; they
/// degrade inside the pipeline and are reported as values.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("failed to decode envelope: {0}")]
    Decode(String),

    #[error("workflow engine rejected the message ({})", describe_status(.status))]
    Dispatch {
        status: Option<u16>,
        details: Value,
    },

    #[error("{message}")]
    Upstream {
        status: StatusCode,
        message: String,
        details: Value,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

fn describe_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("HTTP {code}"),
        None => "no response".to_string(),
    }
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::UnsupportedOperation(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { status, .. } => *status,
            Self::Decode(_) | Self::Dispatch { .. } | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn details(&self) -> Value {
        match self {
            Self::Dispatch { details, .. } | Self::Upstream { details, .. } => details.clone(),
            Self::Internal(e) => Value::String(format!("{e:#}")),
            Self::Decode(reason) => Value::String(reason.clone()),
            Self::InvalidRequest(_) | Self::UnsupportedOperation(_) => Value::Null,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = json!({
            "success": false,
            "error": self.to_string(),
            "details": self.details(),
        });
        if let Self::Upstream { status, .. } = &self {
            body["http_code"] = json!(status.as_u16());
        }

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "request rejected");
        }

        (status, Json(body)).into_response()
    }
}
