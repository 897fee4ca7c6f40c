use std::time::Duration;

use clap::Parser;

use crate::models::DEFAULT_TIMEOUT_SECS;

/// Backend the server-URL field starts with for every new session.
pub const DEFAULT_SERVER_URL: &str = "https://dominant-usually-oyster.ngrok-free.app";

/// Process settings for the Glaucoma Agent web app.
#[derive(Parser, Debug, Clone)]
#[command(name = "glaucoma-agent")]
#[command(version)]
#[command(about = "Upload a fundus image and show the backend's glaucoma assessment")]
pub struct Settings {
    /// Address the HTTP server listens on.
    #[arg(long, env = "GLAUCOMA_AGENT_BIND", default_value = "127.0.0.1:8080")]
    pub bind: String,

    /// Prediction backend each new session starts with.
    #[arg(long, env = "GLAUCOMA_AGENT_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    pub default_server_url: String,

    /// Upper bound on a single backend call, in seconds.
    #[arg(long, env = "GLAUCOMA_AGENT_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Largest accepted image upload, in megabytes.
    #[arg(long, env = "GLAUCOMA_AGENT_MAX_UPLOAD_MB", default_value_t = 20)]
    pub max_upload_mb: usize,

    /// Sessions idle longer than this forget their server URL.
    #[arg(long, env = "GLAUCOMA_AGENT_SESSION_TTL_SECS", default_value_t = 12 * 60 * 60)]
    pub session_ttl_secs: u64,
}

impl Settings {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}
