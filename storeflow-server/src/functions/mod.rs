//! Server functions
//!
//! Privileged one-shot operations: provisioning a store with its manager
//! account, provisioning staff accounts, duplicate lookups and the
//! transactional mails. Each call either completes or returns its error
//! verbatim; nothing is retried.

pub mod email;
pub mod provisioning;
pub mod setup_token;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use shared::error::AppResult;
use shared::models::StaffAccountCreate;

pub use email::{LogMailer, Mail, Mailer, RecordingMailer, SesMailer};
pub use provisioning::FunctionsService;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoreRequest {
    pub store_name: String,
    pub manager_email: String,
    #[serde(default)]
    pub business_number: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoreResponse {
    pub success: bool,
    pub store_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordSetupMailRequest {
    pub store_id: String,
    pub store_name: String,
    pub manager_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCreationMailRequest {
    pub store_name: String,
    pub manager_email: String,
    #[serde(default)]
    pub business_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletePasswordSetupRequest {
    pub email: String,
    pub store_id: String,
    pub token: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStaffResponse {
    pub success: bool,
    pub account_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailDuplicate {
    pub is_duplicate: bool,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResult {
    pub success: bool,
    pub message: String,
}

impl FunctionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait StoreFunctions: Send + Sync {
    /// New store in `initial` status, its storeAdmin account keyed by the
    /// provider uid, and a password-setup mail to the manager
    async fn create_store_with_account(&self, req: CreateStoreRequest) -> AppResult<CreateStoreResponse>;

    async fn send_password_setup_email(&self, req: PasswordSetupMailRequest) -> AppResult<FunctionResult>;

    async fn resend_password_setup_email(&self, req: PasswordSetupMailRequest) -> AppResult<FunctionResult>;

    async fn send_store_creation_email(&self, req: StoreCreationMailRequest) -> AppResult<FunctionResult>;

    /// Finish onboarding from the emailed link
    async fn complete_password_setup(&self, req: CompletePasswordSetupRequest) -> AppResult<FunctionResult>;

    /// Staff account without provider credential (`uid == id`)
    async fn create_staff_account(&self, req: StaffAccountCreate) -> AppResult<CreateStaffResponse>;

    async fn check_email_duplicate(&self, email: &str) -> AppResult<EmailDuplicate>;
}
