//! Server configuration
//!
//! | Variable | Default | |
//! |---|---|---|
//! | `HTTP_PORT` | `8080` | |
//! | `ENVIRONMENT` | `development` | `development` / `staging` / `production` |
//! | `APP_URL` | `http://localhost:5173` | base of links in outgoing mail |
//! | `MAIL_BACKEND` | `log` | `log` or `ses` |
//! | `MAIL_FROM` | `noreply@storeflow.kr` | |
//! | `SETUP_TOKEN_SECRET` | dev value | required outside development |
//! | `DATA_DIR` | `./data` | local object storage root |
//! | `LOG_DIR` | unset | daily rolling file when set |
//! | `LOG_LEVEL` | `info` | |
//! | `STORAGE_BACKEND` | `local` | `local` or `s3` |
//! | `S3_BUCKET` | `storeflow-files` | |
//! | `STORAGE_BASE_URL` | `http://localhost:{port}/files` | public URL prefix of stored objects |

use std::path::PathBuf;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    S3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailBackend {
    /// Write mail to the log only
    Log,
    Ses,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub environment: String,
    pub app_url: String,
    pub mail_backend: MailBackend,
    pub mail_from: String,
    /// HS256 secret for password-setup links
    pub setup_token_secret: String,
    pub data_dir: PathBuf,
    pub log_dir: Option<String>,
    pub log_level: String,
    pub storage_backend: StorageBackend,
    pub s3_bucket: String,
    pub storage_base_url: String,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let http_port = std::env::var("HTTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let storage_backend = match std::env::var("STORAGE_BACKEND").as_deref() {
            Ok("s3") => StorageBackend::S3,
            Ok("local") | Err(_) => StorageBackend::Local,
            Ok(other) => return Err(format!("Unknown STORAGE_BACKEND: {other}").into()),
        };
        let mail_backend = match std::env::var("MAIL_BACKEND").as_deref() {
            Ok("ses") => MailBackend::Ses,
            Ok("log") | Err(_) => MailBackend::Log,
            Ok(other) => return Err(format!("Unknown MAIL_BACKEND: {other}").into()),
        };

        Ok(Self {
            http_port,
            app_url: std::env::var("APP_URL")
                .unwrap_or_else(|_| "http://localhost:5173".into())
                .trim_end_matches('/')
                .to_string(),
            mail_backend,
            mail_from: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| crate::functions::email::DEFAULT_MAIL_FROM.into()),
            setup_token_secret: Self::require_secret("SETUP_TOKEN_SECRET", &environment)?,
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            log_dir: std::env::var("LOG_DIR").ok().filter(|s| !s.is_empty()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            storage_backend,
            s3_bucket: std::env::var("S3_BUCKET").unwrap_or_else(|_| "storeflow-files".into()),
            storage_base_url: std::env::var("STORAGE_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{http_port}/files")),
            environment,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_secret_dev_fallback() {
        let val = Config::require_secret("STOREFLOW_TEST_UNSET_SECRET", "development").unwrap();
        assert_eq!(val, "dev-STOREFLOW_TEST_UNSET_SECRET-not-for-production");
        assert!(Config::require_secret("STOREFLOW_TEST_UNSET_SECRET", "production").is_err());
    }
}
