use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Why a dispatch produced no result. Every variant is shown to the user
/// verbatim and leaves the page ready for another attempt.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    #[error(
        "HTTP client is unavailable in this build. Rebuild with the default TLS features enabled and restart the app."
    )]
    MissingCapability,

    #[error("Failed to reach server: {0}")]
    Transport(String),

    #[error("{error}\nDetail: {detail}")]
    Server {
        status: u16,
        error: String,
        detail: String,
    },

    #[error("Server returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("Unexpected response from server (not JSON object).")]
    MalformedResponse,
}

impl PredictionError {
    /// HTTP status reported by the backend, if it answered at all.
    pub fn backend_status(&self) -> Option<u16> {
        match self {
            PredictionError::Server { status, .. } | PredictionError::HttpStatus { status } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Problems with the browser's upload, caught before the backend is called.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Unsupported file type \"{0}\". Accepted formats: PNG, JPG.")]
    UnsupportedType(String),

    #[error("Upload exceeds the {} limit.", human_size(*limit_bytes))]
    TooLarge { limit_bytes: usize },

    #[error("No image file was uploaded.")]
    MissingImage,

    #[error("Malformed upload: {0}")]
    Multipart(String),
}

impl ResponseError for UploadError {
    fn status_code(&self) -> StatusCode {
        match self {
            UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

/// Whole megabytes when the limit is a multiple of one, otherwise bytes.
fn human_size(bytes: usize) -> String {
    const MB: usize = 1024 * 1024;
    if bytes >= MB && bytes % MB == 0 {
        format!("{} MB", bytes / MB)
    } else {
        format!("{} bytes", bytes)
    }
}

pub type Result<T, E = PredictionError> = std::result::Result<T, E>;
