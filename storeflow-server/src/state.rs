//! Application state
//!
//! Every client and backend is built once here and shared by `Arc`.

use std::sync::Arc;

use crate::auth::{IdentityProvider, MemoryIdentityProvider};
use crate::config::{Config, MailBackend, StorageBackend};
use crate::docstore::{DocumentAccess, MemoryStore};
use crate::functions::{FunctionsService, LogMailer, Mailer, SesMailer, StoreFunctions};
use crate::storage::{LocalStorage, ObjectStorage, S3Storage};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub access: DocumentAccess,
    pub provider: Arc<dyn IdentityProvider>,
    pub functions: Arc<dyn StoreFunctions>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl AppState {
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let needs_aws =
            config.mail_backend == MailBackend::Ses || config.storage_backend == StorageBackend::S3;
        let aws = if needs_aws {
            Some(aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await)
        } else {
            None
        };

        let mailer: Arc<dyn Mailer> = match (&aws, config.mail_backend) {
            (Some(aws), MailBackend::Ses) => Arc::new(SesMailer::new(
                aws_sdk_sesv2::Client::new(aws),
                config.mail_from.clone(),
            )),
            _ => Arc::new(LogMailer),
        };

        let storage: Arc<dyn ObjectStorage> = match (&aws, config.storage_backend) {
            (Some(aws), StorageBackend::S3) => Arc::new(S3Storage::new(
                aws_sdk_s3::Client::new(aws),
                config.s3_bucket.clone(),
                config.storage_base_url.clone(),
            )),
            _ => {
                tokio::fs::create_dir_all(&config.data_dir).await?;
                Arc::new(LocalStorage::new(
                    config.data_dir.clone(),
                    config.storage_base_url.clone(),
                ))
            }
        };

        tracing::info!(
            mail = ?config.mail_backend,
            storage = ?config.storage_backend,
            "Backends configured"
        );

        Ok(Self::with_backends(
            Arc::new(MemoryIdentityProvider::new()),
            DocumentAccess::new(Arc::new(MemoryStore::new())),
            mailer,
            storage,
            &config.app_url,
            &config.setup_token_secret,
        ))
    }

    /// Assemble state from prebuilt backends
    pub fn with_backends(
        provider: Arc<dyn IdentityProvider>,
        access: DocumentAccess,
        mailer: Arc<dyn Mailer>,
        storage: Arc<dyn ObjectStorage>,
        app_url: &str,
        setup_secret: &str,
    ) -> Self {
        let functions = Arc::new(FunctionsService::new(
            provider.clone(),
            access.clone(),
            mailer,
            app_url,
            setup_secret,
        ));
        Self {
            access,
            provider,
            functions,
            storage,
        }
    }
}
