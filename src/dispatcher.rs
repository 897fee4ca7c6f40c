//! Single-shot client for the backend's `POST /predict` endpoint.
//!
//! One upload, one request, one outcome. There are no retries and no
//! caching; every fault becomes a [`PredictionError`] for the page to show.

use std::error::Error as _;
use std::time::{Duration, Instant};

use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{PredictionError, Result};
use crate::models::{is_present, value_text, PredictionRequest, PredictionResult};

/// Multipart field the backend reads the upload from.
pub const IMAGE_FIELD: &str = "image";

const DETAIL_FALLBACK: &str = "N/A";

#[derive(Clone)]
pub struct Dispatcher {
    http: Option<Client>,
}

impl Dispatcher {
    /// Builds the shared HTTP client. A build failure is remembered so each
    /// dispatch can report it instead of the process refusing to start.
    pub fn new() -> Self {
        let http = Client::builder()
            .user_agent(concat!("glaucoma-agent/", env!("CARGO_PKG_VERSION")))
            .build();

        match http {
            Ok(client) => Self { http: Some(client) },
            Err(e) => {
                warn!(error = %e, "HTTP client could not be built; predictions are disabled");
                Self { http: None }
            }
        }
    }

    /// A dispatcher with no HTTP client; every call fails with
    /// [`PredictionError::MissingCapability`].
    pub fn unavailable() -> Self {
        Self { http: None }
    }

    pub fn is_available(&self) -> bool {
        self.http.is_some()
    }

    pub async fn dispatch(&self, request: PredictionRequest) -> Result<PredictionResult> {
        let http = self.http.as_ref().ok_or(PredictionError::MissingCapability)?;

        let url = request.endpoint();
        let mime = request.mime_type();
        let timeout = request.timeout_seconds;
        let size = request.file_bytes.len();

        let part = Part::bytes(request.file_bytes)
            .file_name(request.file_name)
            .mime_str(&mime)
            .map_err(|e| PredictionError::Transport(describe(&e, timeout)))?;
        let form = Form::new().part(IMAGE_FIELD, part);

        let started = Instant::now();
        let response = http
            .post(&url)
            .timeout(Duration::from_secs(timeout))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!(%url, error = %e, "backend unreachable");
                PredictionError::Transport(describe(&e, timeout))
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            warn!(%url, error = %e, "failed to read backend response");
            PredictionError::Transport(describe(&e, timeout))
        })?;

        info!(
            %url,
            status = status.as_u16(),
            upload_bytes = size,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "backend responded"
        );

        // Error bodies are often JSON too, so parse before looking at the status.
        let data = serde_json::from_slice::<Value>(&body).ok();

        let outcome = interpret(status, data);
        if let Err(e) = &outcome {
            warn!(%url, status = status.as_u16(), error = %e, "prediction failed");
        }
        outcome
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Partitions a backend answer into a result or an error.
pub fn interpret(status: StatusCode, data: Option<Value>) -> Result<PredictionResult> {
    if !status.is_success() {
        let server_error = data.as_ref().and_then(Value::as_object).and_then(|body| {
            let error = body.get("error").filter(|v| is_present(v))?;
            let detail = body
                .get("detail")
                .filter(|v| is_present(v))
                .map(value_text)
                .unwrap_or_else(|| DETAIL_FALLBACK.to_string());
            Some(PredictionError::Server {
                status: status.as_u16(),
                error: value_text(error),
                detail,
            })
        });

        return Err(server_error.unwrap_or(PredictionError::HttpStatus {
            status: status.as_u16(),
        }));
    }

    match data {
        Some(Value::Object(map)) => Ok(PredictionResult::from_json(map)),
        _ => Err(PredictionError::MalformedResponse),
    }
}

/// reqwest's own message omits the underlying cause, so walk the source chain.
fn describe(err: &reqwest::Error, timeout_seconds: u64) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }

    if err.is_timeout() {
        format!("request timed out after {}s ({})", timeout_seconds, message)
    } else {
        message
    }
}
