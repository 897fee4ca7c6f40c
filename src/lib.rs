//! Glaucoma Agent: a one-page web form that sends a fundus image to a
//! remote classification backend and shows its verdict.
//!
//! The page is rendered on the server. Each press of "Analyze" makes
//! exactly one `POST {server_url}/predict` call through [`Dispatcher`].

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod models;
pub mod render;
pub mod session;
pub mod upload;

use actix_cors::Cors;
use actix_web::web;

pub use config::Settings;
pub use dispatcher::Dispatcher;
pub use error::{PredictionError, UploadError};
pub use models::{Badge, PredictionRequest, PredictionResult};
pub use session::{SessionConfig, SessionStore};

/// Shared by every worker; the session store is the only mutable part.
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub sessions: SessionStore,
    pub timeout_seconds: u64,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        dispatcher: Dispatcher,
        sessions: SessionStore,
        timeout_seconds: u64,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            dispatcher,
            sessions,
            timeout_seconds,
            max_upload_bytes,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            Dispatcher::new(),
            SessionStore::new(settings.default_server_url.clone(), settings.session_ttl()),
            settings.timeout_secs,
            settings.max_upload_bytes(),
        )
    }
}

/// Registers every route. `/api` is open to cross-origin callers.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let cors = Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header();

    cfg.route("/", web::get().to(handlers::index))
        .route("/settings", web::post().to(handlers::save_settings))
        .route("/analyze", web::post().to(handlers::analyze))
        .route("/health", web::get().to(handlers::health))
        .service(
            web::scope("/api")
                .wrap(cors)
                .route("/predict", web::post().to(handlers::api_predict)),
        );
}
