use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use anyhow::{Context, Result};

/// The application's configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// The URL of the PostgreSQL database. In-memory stores are used when unset.
    pub database_url: Option<String>,
    /// The URL of the Redis server. In-memory sessions are used when unset.
    pub redis_url: Option<String>,
    /// The duration of a session in days.
    pub session_duration_days: i64,
    /// The directory QR code images are written to.
    pub qr_dir: PathBuf,
    /// The maximum accepted request body size in bytes.
    pub max_upload_bytes: usize,
    /// Whether cookies must be marked `Secure`.
    pub secure_cookies: bool,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
                .parse()
                .context("Invalid BIND_ADDR")?,
            database_url: non_empty_var("DATABASE_URL"),
            redis_url: non_empty_var("REDIS_URL"),
            session_duration_days: env::var("SESSION_DURATION_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .context("Invalid SESSION_DURATION_DAYS")?,
            qr_dir: PathBuf::from(
                env::var("QR_DIR").unwrap_or_else(|_| "static/qr_codes".to_string()),
            ),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .unwrap_or_else(|_| (10 * 1024 * 1024).to_string())
                .parse()
                .context("Invalid MAX_UPLOAD_BYTES")?,
            secure_cookies: env::var("APP_ENV")
                .unwrap_or_else(|_| "development".to_string())
                == "production",
        })
    }

    /// A configuration backed entirely by in-memory stores, writing QR codes
    /// under `dir`.
    pub fn in_memory(dir: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_url: None,
            redis_url: None,
            session_duration_days: 7,
            qr_dir: dir.into().join("qr_codes"),
            max_upload_bytes: 10 * 1024 * 1024,
            secure_cookies: false,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
