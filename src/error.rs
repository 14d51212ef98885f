use std::{error::Error, fmt, io, path::PathBuf};

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::error;
use ml_core::MlError;
use serde_json::json;

use crate::features::FieldError;

/// The service's result type.
pub type Result<T> = std::result::Result<T, ServiceErr>;

/// Failures across startup, training and serving.
#[derive(Debug)]
pub enum ServiceErr {
    Io(io::Error),
    /// A configuration value could not be parsed or is out of range.
    InvalidConfig(String),
    /// Downloading the dataset archive failed.
    Fetch {
        url: String,
        source: reqwest::Error,
    },
    /// The dataset archive or file doesn't have the expected content.
    MalformedDataset {
        line: Option<usize>,
        reason: String,
    },
    Ml(MlError),
    /// No artifact exists at the configured path.
    ArtifactMissing(PathBuf),
    /// The artifact could not be encoded or decoded.
    ArtifactCodec(bincode::Error),
    /// The artifact was written by an incompatible version or feature schema.
    IncompatibleArtifact(String),
    /// The request body is not a valid feature vector.
    Validation(Vec<FieldError>),
    /// The request body was refused before being decoded, e.g. too large
    /// or without a JSON content type.
    Rejected(JsonRejection),
    /// A blocking task panicked or was cancelled.
    Internal(String),
}

impl fmt::Display for ServiceErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceErr::Io(e) => write!(f, "io error: {e}"),
            ServiceErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            ServiceErr::Fetch { url, source } => write!(f, "failed to fetch {url}: {source}"),
            ServiceErr::MalformedDataset {
                line: Some(line),
                reason,
            } => write!(f, "malformed dataset at line {line}: {reason}"),
            ServiceErr::MalformedDataset { line: None, reason } => {
                write!(f, "malformed dataset: {reason}")
            }
            ServiceErr::Ml(e) => write!(f, "model error: {e}"),
            ServiceErr::ArtifactMissing(path) => {
                write!(f, "no model artifact at {}", path.display())
            }
            ServiceErr::ArtifactCodec(e) => write!(f, "corrupt model artifact: {e}"),
            ServiceErr::IncompatibleArtifact(msg) => write!(f, "incompatible model artifact: {msg}"),
            ServiceErr::Validation(errors) => {
                write!(f, "invalid request: {} field error(s)", errors.len())
            }
            ServiceErr::Rejected(rejection) => write!(f, "request rejected: {rejection}"),
            ServiceErr::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl Error for ServiceErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ServiceErr::Io(e) => Some(e),
            ServiceErr::Fetch { source, .. } => Some(source),
            ServiceErr::Ml(e) => Some(e),
            ServiceErr::ArtifactCodec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ServiceErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<MlError> for ServiceErr {
    fn from(value: MlError) -> Self {
        Self::Ml(value)
    }
}

/// Decoding failures carry the line of the record they happened on.
impl From<csv::Error> for ServiceErr {
    fn from(value: csv::Error) -> Self {
        let line = value.position().map(|pos| pos.line() as usize);
        let reason = value.to_string();

        match value.into_kind() {
            csv::ErrorKind::Io(e) => Self::Io(e),
            _ => Self::MalformedDataset { line, reason },
        }
    }
}

impl From<bincode::Error> for ServiceErr {
    fn from(value: bincode::Error) -> Self {
        Self::ArtifactCodec(value)
    }
}

/// Validation failures and rejections are the client's fault, anything else is ours.
impl IntoResponse for ServiceErr {
    fn into_response(self) -> Response {
        match self {
            ServiceErr::Validation(detail) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": detail }))).into_response()
            }
            ServiceErr::Rejected(rejection) => {
                let body = json!({ "detail": rejection.body_text() });
                (rejection.status(), Json(body)).into_response()
            }
            other => {
                error!("request failed: {other}");
                let body = json!({ "detail": other.to_string() });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}
