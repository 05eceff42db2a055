//! Environment-derived configuration, loaded via `clap`'s `env` feature.
//! A `.env` file is loaded first, if present, mirroring the teacher CLI's
//! silent-if-absent `.env` auto-detection.

use std::path::Path;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "autotaskd", about = "Task-automation engine")]
pub struct AppConfig {
    /// Sqlite DSN for the management store.
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://autotask.db")]
    pub database_url: String,

    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// When set, internal error detail is included in HTTP error bodies.
    #[arg(long, env = "DEBUG", default_value_t = false)]
    pub debug: bool,
}

impl AppConfig {
    pub fn load() -> Self {
        load_dotenv();
        AppConfig::parse()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Loads a `.env` file from the current directory if one exists. Absence
/// is not an error — only a malformed file is reported.
fn load_dotenv() {
    if !Path::new(".env").exists() {
        return;
    }
    if let Err(e) = dotenvy::dotenv() {
        tracing::warn!(error = %e, "failed to load .env");
    }
}
