//! Configuration management

use anyhow::{self, Context, Result};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Record store service base URL (clients, drafts, uploads)
    pub record_store_url: String,

    /// Document render service endpoint
    pub render_service_url: String,

    /// Bearer token for service-to-service calls
    pub internal_service_token: String,

    /// Mirror logs to a daily-rolling file
    pub log_to_file: bool,

    /// Directory for log files and the job history snapshot
    pub log_dir: String,

    /// Requested concurrency. Generation batches run one at a time so the
    /// render service is never hammered; values above 1 only log a warning.
    pub worker_concurrency: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url =
            std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let record_store_url =
            std::env::var("RECORD_STORE_URL").context("RECORD_STORE_URL must be set")?;

        let render_service_url =
            std::env::var("RENDER_SERVICE_URL").context("RENDER_SERVICE_URL must be set")?;

        let internal_service_token = std::env::var("INTERNAL_SERVICE_TOKEN")
            .context("INTERNAL_SERVICE_TOKEN must be set")?;

        if internal_service_token.len() < 16 {
            anyhow::bail!(
                "INTERNAL_SERVICE_TOKEN must be at least 16 bytes (current: {} bytes)",
                internal_service_token.len()
            );
        }

        let log_to_file = std::env::var("LOG_TO_FILE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());

        let worker_concurrency = std::env::var("WORKER_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(1);

        Ok(Self {
            nats_url,
            record_store_url,
            render_service_url,
            internal_service_token,
            log_to_file,
            log_dir,
            worker_concurrency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_required_vars() {
        std::env::set_var("RECORD_STORE_URL", "http://localhost:4010");
        std::env::set_var("RENDER_SERVICE_URL", "http://localhost:4020/render");
        std::env::set_var("INTERNAL_SERVICE_TOKEN", "test-token-0123456789");
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_nats_url_defaults_to_localhost() {
        std::env::remove_var("NATS_URL");
        set_required_vars();

        let config = Config::from_env().unwrap();
        assert_eq!(config.nats_url, "nats://localhost:4222");
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_requires_record_store_url() {
        std::env::remove_var("RECORD_STORE_URL");
        std::env::set_var("RENDER_SERVICE_URL", "http://localhost:4020/render");
        std::env::set_var("INTERNAL_SERVICE_TOKEN", "test-token-0123456789");

        let result = Config::from_env();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_log_to_file_parses_truthy_values() {
        set_required_vars();
        std::env::set_var("LOG_TO_FILE", "true");

        let config = Config::from_env().unwrap();
        assert!(config.log_to_file);

        // Cleanup
        std::env::remove_var("LOG_TO_FILE");
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_rejects_short_service_token() {
        std::env::set_var("RECORD_STORE_URL", "http://localhost:4010");
        std::env::set_var("RENDER_SERVICE_URL", "http://localhost:4020/render");
        std::env::set_var("INTERNAL_SERVICE_TOKEN", "short");

        let result = Config::from_env();
        assert!(result.is_err());

        // Restore a valid token for the other tests
        std::env::set_var("INTERNAL_SERVICE_TOKEN", "test-token-0123456789");
    }
}
