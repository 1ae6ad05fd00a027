use std::path::PathBuf;

use lagooz_core::communication::attachments::{
    DEFAULT_MAX_SINGLE_MB, DEFAULT_MAX_TOTAL_MB, MAX_ATTACHMENTS,
};
use lagooz_core::communication::AttachmentLimits;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for the dispatcher to stop (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub jwt: JwtConfig,
    /// Upload limits for communication attachments.
    pub attachment_limits: AttachmentLimits,
    /// Root directory for stored attachments.
    pub attachment_storage_dir: PathBuf,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                  |
    /// |----------------------------|--------------------------|
    /// | `HOST`                     | `0.0.0.0`                |
    /// | `PORT`                     | `3000`                   |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                     |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                     |
    /// | `MAX_ATTACHMENT_COUNT`     | `10` (never more)        |
    /// | `MAX_SINGLE_ATTACHMENT_MB` | `10`                     |
    /// | `MAX_TOTAL_ATTACHMENT_MB`  | `25`                     |
    /// | `ATTACHMENT_STORAGE_DIR`   | `storage/attachments`    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let max_count: usize = std::env::var("MAX_ATTACHMENT_COUNT")
            .unwrap_or_else(|_| MAX_ATTACHMENTS.to_string())
            .parse()
            .expect("MAX_ATTACHMENT_COUNT must be a valid usize");

        let max_single_mb: u64 = std::env::var("MAX_SINGLE_ATTACHMENT_MB")
            .unwrap_or_else(|_| DEFAULT_MAX_SINGLE_MB.to_string())
            .parse()
            .expect("MAX_SINGLE_ATTACHMENT_MB must be a valid u64");

        let max_total_mb: u64 = std::env::var("MAX_TOTAL_ATTACHMENT_MB")
            .unwrap_or_else(|_| DEFAULT_MAX_TOTAL_MB.to_string())
            .parse()
            .expect("MAX_TOTAL_ATTACHMENT_MB must be a valid u64");

        let attachment_storage_dir = std::env::var("ATTACHMENT_STORAGE_DIR")
            .unwrap_or_else(|_| "storage/attachments".into())
            .into();

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt,
            attachment_limits: AttachmentLimits::from_megabytes(
                max_count,
                max_single_mb,
                max_total_mb,
            ),
            attachment_storage_dir,
        }
    }

    /// Largest request body the server accepts: every attachment at its
    /// total limit plus room for the text fields.
    pub fn body_limit_bytes(&self) -> usize {
        const FORM_FIELDS_ALLOWANCE: u64 = 1024 * 1024;
        usize::try_from(self.attachment_limits.max_total_bytes + FORM_FIELDS_ALLOWANCE)
            .unwrap_or(usize::MAX)
    }
}
