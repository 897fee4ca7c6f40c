use actix_web::{web, App, HttpServer};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use glaucoma_agent::{configure, AppState, Settings};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::parse();
    let state = web::Data::new(AppState::from_settings(&settings));

    info!(
        bind = %settings.bind,
        backend = %settings.default_server_url,
        timeout_secs = settings.timeout_secs,
        "Glaucoma Agent running at http://{}",
        settings.bind
    );

    HttpServer::new(move || App::new().app_data(state.clone()).configure(configure))
        .bind(&settings.bind)?
        .run()
        .await
}
