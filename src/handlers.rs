use actix_multipart::Multipart;
use actix_web::http::header::{self, ContentType};
use actix_web::{web, HttpRequest, HttpResponse, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::error::{PredictionError, UploadError};
use crate::models::{Badge, PredictionRequest, PredictionResult};
use crate::render::{Outcome, Page, MISSING_SERVER_URL};
use crate::session::{session_cookie, session_id, SessionConfig};
use crate::upload::{read_image, UploadedImage};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SettingsForm {
    #[serde(default)]
    pub server_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiQuery {
    pub server_url: Option<String>,
}

/// JSON shape of `/api/predict`: the normalized result plus what the page
/// would have shown for it.
#[derive(Debug, Serialize)]
pub struct ApiPrediction<'a> {
    #[serde(flatten)]
    pub result: &'a PredictionResult,
    pub badge: Badge,
    pub ratio_display: String,
    pub annotated_image_available: bool,
}

pub async fn index(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let session = state.sessions.get(session_id(&req));
    page_response(state.page(&session))
}

pub async fn save_settings(
    req: HttpRequest,
    state: web::Data<AppState>,
    form: web::Form<SettingsForm>,
) -> HttpResponse {
    let (id, session) = state
        .sessions
        .update_server_url(session_id(&req), &form.server_url);
    info!(session = %id, server_url = %session.server_url, "server URL updated");

    HttpResponse::SeeOther()
        .cookie(session_cookie(id))
        .insert_header((header::LOCATION, "/"))
        .finish()
}

pub async fn analyze(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: Multipart,
) -> HttpResponse {
    let session = state.sessions.get(session_id(&req));
    let mut page = state.page(&session);

    let upload = match read_image(payload, state.max_upload_bytes).await {
        Ok(Some(upload)) => upload,
        Ok(None) => return page_response(page),
        Err(e) => {
            warn!(error = %e, "upload rejected");
            page.outcome = Outcome::Error(e.to_string());
            return page_response(page);
        }
    };

    page.preview = Some(upload.preview());
    page.outcome = if session.has_server_url() {
        match state.predict(&session.server_url, upload).await {
            Ok(result) => Outcome::Result(result),
            Err(e) => Outcome::Error(e.to_string()),
        }
    } else {
        Outcome::Error(MISSING_SERVER_URL.to_string())
    };

    page_response(page)
}

pub async fn api_predict(
    state: web::Data<AppState>,
    query: web::Query<ApiQuery>,
    payload: Multipart,
) -> Result<HttpResponse> {
    let upload = read_image(payload, state.max_upload_bytes)
        .await?
        .ok_or(UploadError::MissingImage)?;

    let server_url = query
        .server_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| state.sessions.default_server_url());

    match state.predict(server_url, upload).await {
        Ok(result) => Ok(HttpResponse::Ok().json(ApiPrediction {
            badge: result.badge(),
            ratio_display: result.ratio_display(),
            annotated_image_available: result.annotated_image().is_some(),
            result: &result,
        })),
        Err(e) => Ok(HttpResponse::BadGateway().json(error_body(&e))),
    }
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

impl AppState {
    fn page(&self, session: &SessionConfig) -> Page {
        let mut page = Page::new(session.server_url.clone());
        if !self.dispatcher.is_available() {
            page.client_warning = Some(PredictionError::MissingCapability.to_string());
        }
        page
    }

    async fn predict(
        &self,
        server_url: &str,
        upload: UploadedImage,
    ) -> Result<PredictionResult, PredictionError> {
        info!(server_url, file = %upload.file_name, "dispatching prediction");
        let request = PredictionRequest::new(server_url, upload.file_name, upload.bytes)
            .with_timeout(self.timeout_seconds);
        self.dispatcher.dispatch(request).await
    }
}

fn error_body(err: &PredictionError) -> serde_json::Value {
    match err.backend_status() {
        Some(status) => json!({ "error": err.to_string(), "backend_status": status }),
        None => json!({ "error": err.to_string() }),
    }
}

fn page_response(page: Page) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(page.render())
}
