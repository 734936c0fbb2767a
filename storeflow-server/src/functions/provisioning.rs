//! Provisioning functions backed by the identity provider, the document store
//! and a mailer

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, json};

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{Account, Role, StaffAccountCreate, collections};
use shared::util::new_id;

use super::email::{Mailer, password_setup_link, password_setup_mail, store_creation_mail};
use super::{
    CompletePasswordSetupRequest, CreateStaffResponse, CreateStoreRequest, CreateStoreResponse,
    EmailDuplicate, FunctionResult, PasswordSetupMailRequest, StoreCreationMailRequest,
    StoreFunctions, setup_token,
};
use crate::auth::IdentityProvider;
use crate::auth::provider::temporary_password;
use crate::docstore::{DocumentAccess, Query};
use crate::utils::validation::validate_range;

const MIN_PASSWORD_LEN: usize = 8;

fn missing_fields() -> AppError {
    AppError::with_message(ErrorCode::RequiredField, "필수 정보가 누락되었습니다.")
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Prefix a failure with the function's name, keeping its code and details
fn failed(prefix: &'static str) -> impl Fn(AppError) -> AppError {
    move |mut e| {
        e.message = format!("{prefix}: {}", e.message);
        e
    }
}

pub struct FunctionsService {
    provider: Arc<dyn IdentityProvider>,
    access: DocumentAccess,
    mailer: Arc<dyn Mailer>,
    app_url: String,
    setup_secret: String,
}

impl FunctionsService {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        access: DocumentAccess,
        mailer: Arc<dyn Mailer>,
        app_url: impl Into<String>,
        setup_secret: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            access,
            mailer,
            app_url: app_url.into(),
            setup_secret: setup_secret.into(),
        }
    }

    async fn stores_with_manager_email(&self, email: &str) -> AppResult<usize> {
        let found = self
            .access
            .query(collections::STORES, &Query::new().eq("managerEmail", email))
            .await?;
        Ok(found.len())
    }

    async fn send_setup_mail(&self, req: &PasswordSetupMailRequest, resend: bool) -> AppResult<()> {
        let token = setup_token::issue(&self.setup_secret, &req.manager_email, &req.store_id)?;
        let link = password_setup_link(&self.app_url, &req.manager_email, &req.store_id, &token);
        let mail = password_setup_mail(&req.manager_email, &req.store_name, &link, resend);
        self.mailer.send(&mail).await
    }

    async fn create_store_inner(&self, req: CreateStoreRequest) -> AppResult<CreateStoreResponse> {
        let store_name = req.store_name.trim();
        let manager_email = req.manager_email.trim();

        if self.stores_with_manager_email(manager_email).await? > 0 {
            return Err(AppError::with_message(
                ErrorCode::ManagerEmailExists,
                "이미 사용 중인 담당자 이메일입니다.",
            ));
        }

        let user = self
            .provider
            .create_user(manager_email, &temporary_password())
            .await
            .map_err(|e| match e.code {
                ErrorCode::EmailExists => {
                    AppError::with_message(ErrorCode::EmailExists, "이 이메일은 이미 사용 중입니다.")
                }
                _ => e,
            })?;

        let mut store = Map::new();
        store.insert("name".into(), json!(store_name));
        if let Some(number) = req.business_number.as_deref().filter(|n| !blank(n)) {
            store.insert("businessNumber".into(), json!(number.trim()));
        }
        store.insert("managerEmail".into(), json!(manager_email));
        store.insert("logoUrl".into(), json!(req.logo_url.filter(|u| !blank(u))));
        store.insert("status".into(), json!("initial"));
        let store_id = self.access.create(collections::STORES, store, None).await?;

        let account = Account {
            id: user.uid.clone(),
            role: Role::StoreAdmin,
            username: manager_email
                .split('@')
                .next()
                .unwrap_or(manager_email)
                .to_string(),
            name: format!("{store_name} 매장 관리자"),
            email: Some(manager_email.to_string()),
            uid: Some(user.uid.clone()),
            store_id: Some(store_id.clone()),
            created_at: 0,
            updated_at: 0,
        };
        self.access
            .create_as(collections::ACCOUNTS, &account, Some(&user.uid))
            .await?;

        tracing::info!(
            store_id = %store_id,
            uid = %user.uid,
            manager_email = %manager_email,
            "Store provisioned"
        );

        let mail = PasswordSetupMailRequest {
            store_id: store_id.clone(),
            store_name: store_name.to_string(),
            manager_email: manager_email.to_string(),
        };
        self.send_setup_mail(&mail, false).await?;

        Ok(CreateStoreResponse {
            success: true,
            store_id,
            message: "매장이 생성되었고 담당자에게 비밀번호 설정 이메일이 발송되었습니다.".into(),
        })
    }

    async fn create_staff_inner(&self, req: StaffAccountCreate) -> AppResult<CreateStaffResponse> {
        let username = req.username.trim();
        let existing = self
            .access
            .query(
                collections::ACCOUNTS,
                &Query::new()
                    .eq("storeId", req.store_id.as_str())
                    .eq("username", username)
                    .eq("role", Role::Staff.as_str()),
            )
            .await?;
        if !existing.is_empty() {
            return Err(AppError::with_message(
                ErrorCode::UsernameExists,
                "이미 사용 중인 아이디입니다.",
            )
            .with_detail("username", username));
        }

        let id = new_id();
        let account = Account {
            id: id.clone(),
            role: Role::Staff,
            username: username.to_string(),
            name: req.name.trim().to_string(),
            email: None,
            uid: Some(id.clone()),
            store_id: Some(req.store_id.clone()),
            created_at: 0,
            updated_at: 0,
        };
        self.access
            .create_as(collections::ACCOUNTS, &account, Some(&id))
            .await?;

        tracing::info!(account_id = %id, store_id = %req.store_id, username = %username, "Staff account created");
        Ok(CreateStaffResponse {
            success: true,
            account_id: id,
            message: "사원 계정이 생성되었습니다.".into(),
        })
    }
}

#[async_trait]
impl StoreFunctions for FunctionsService {
    async fn create_store_with_account(&self, req: CreateStoreRequest) -> AppResult<CreateStoreResponse> {
        if blank(&req.store_name) || blank(&req.manager_email) {
            return Err(missing_fields());
        }
        self.create_store_inner(req)
            .await
            .map_err(failed("매장 생성 실패"))
    }

    async fn send_password_setup_email(&self, req: PasswordSetupMailRequest) -> AppResult<FunctionResult> {
        if blank(&req.store_id) || blank(&req.store_name) || blank(&req.manager_email) {
            return Err(missing_fields());
        }
        self.send_setup_mail(&req, false).await?;
        tracing::info!(store_id = %req.store_id, "Password setup mail sent");
        Ok(FunctionResult::ok("비밀번호 설정 이메일이 발송되었습니다."))
    }

    async fn resend_password_setup_email(&self, req: PasswordSetupMailRequest) -> AppResult<FunctionResult> {
        if blank(&req.store_id) || blank(&req.store_name) || blank(&req.manager_email) {
            return Err(missing_fields());
        }
        self.send_setup_mail(&req, true).await.map_err(|mut e| {
            e.message = e.message.replacen("이메일 발송 실패", "이메일 재발송 실패", 1);
            e
        })?;
        tracing::info!(store_id = %req.store_id, "Password setup mail re-sent");
        Ok(FunctionResult::ok("비밀번호 설정 이메일이 재발송되었습니다."))
    }

    async fn send_store_creation_email(&self, req: StoreCreationMailRequest) -> AppResult<FunctionResult> {
        if blank(&req.store_name) || blank(&req.manager_email) {
            return Err(missing_fields());
        }
        let mail = store_creation_mail(
            &req.manager_email,
            &req.store_name,
            req.business_number.as_deref(),
            &self.app_url,
        );
        self.mailer.send(&mail).await?;
        tracing::info!(manager_email = %req.manager_email, "Store creation mail sent");
        Ok(FunctionResult::ok("매장 생성 완료 이메일이 발송되었습니다."))
    }

    async fn complete_password_setup(&self, req: CompletePasswordSetupRequest) -> AppResult<FunctionResult> {
        if blank(&req.email) || blank(&req.store_id) {
            return Err(AppError::with_message(ErrorCode::InvalidRequest, "잘못된 접근입니다."));
        }
        validate_range(req.password.chars().count(), "password", MIN_PASSWORD_LEN, 128)?;
        setup_token::verify(&self.setup_secret, &req.token, &req.email, &req.store_id)?;

        let account: Option<Account> = self
            .access
            .query_as(
                collections::ACCOUNTS,
                &Query::new()
                    .eq("email", req.email.as_str())
                    .eq("storeId", req.store_id.as_str())
                    .limit(1),
            )
            .await?
            .pop();
        if account.is_none() {
            return Err(AppError::new(ErrorCode::AccountNotFound).with_detail("email", req.email.clone()));
        }

        self.provider.set_password(&req.email, &req.password).await?;
        tracing::info!(store_id = %req.store_id, "Manager password set");
        Ok(FunctionResult::ok("비밀번호 설정이 완료되었습니다."))
    }

    async fn create_staff_account(&self, req: StaffAccountCreate) -> AppResult<CreateStaffResponse> {
        if blank(&req.store_id) || blank(&req.name) || blank(&req.username) {
            return Err(missing_fields());
        }
        self.create_staff_inner(req)
            .await
            .map_err(failed("사원 계정 생성 실패"))
    }

    async fn check_email_duplicate(&self, email: &str) -> AppResult<EmailDuplicate> {
        if blank(email) {
            return Err(AppError::with_message(ErrorCode::RequiredField, "이메일이 필요합니다."));
        }
        let count = self
            .stores_with_manager_email(email.trim())
            .await
            .map_err(failed("이메일 중복 확인 실패"))?;
        Ok(EmailDuplicate {
            is_duplicate: count > 0,
            count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryIdentityProvider;
    use crate::docstore::MemoryStore;
    use crate::functions::RecordingMailer;
    use shared::models::{Store, StoreStatus};

    struct Fixture {
        functions: FunctionsService,
        provider: Arc<MemoryIdentityProvider>,
        access: DocumentAccess,
        mailer: Arc<RecordingMailer>,
    }

    fn fixture() -> Fixture {
        let provider = Arc::new(MemoryIdentityProvider::new());
        let access = DocumentAccess::new(Arc::new(MemoryStore::new()));
        let mailer = Arc::new(RecordingMailer::new());
        let functions = FunctionsService::new(
            provider.clone(),
            access.clone(),
            mailer.clone(),
            "https://app.storeflow.kr",
            "setup-secret",
        );
        Fixture {
            functions,
            provider,
            access,
            mailer,
        }
    }

    fn create_request(email: &str) -> CreateStoreRequest {
        CreateStoreRequest {
            store_name: "강남점".into(),
            manager_email: email.into(),
            business_number: None,
            logo_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_store_provisions_account_and_mails() {
        let fx = fixture();
        let res = fx
            .functions
            .create_store_with_account(create_request("boss@store.kr"))
            .await
            .unwrap();
        assert!(res.success);

        let store: Store = fx
            .access
            .get_as(collections::STORES, &res.store_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.status, StoreStatus::Initial);
        assert_eq!(store.business_number, "");

        let admins: Vec<Account> = fx
            .access
            .query_as(collections::ACCOUNTS, &Query::new().eq("storeId", res.store_id.as_str()))
            .await
            .unwrap();
        assert_eq!(admins.len(), 1);
        let admin = &admins[0];
        assert_eq!(admin.role, Role::StoreAdmin);
        assert_eq!(admin.username, "boss");
        assert_eq!(admin.name, "강남점 매장 관리자");
        assert_eq!(admin.uid.as_deref(), Some(admin.id.as_str()));
        assert!(fx.provider.user_exists("boss@store.kr").await.unwrap());

        let sent = fx.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "boss@store.kr");
        assert!(sent[0].html.contains(&format!("storeId={}", res.store_id)));
    }

    #[tokio::test]
    async fn test_duplicate_manager_email_rejected() {
        let fx = fixture();
        fx.functions
            .create_store_with_account(create_request("boss@store.kr"))
            .await
            .unwrap();
        let err = fx
            .functions
            .create_store_with_account(create_request("boss@store.kr"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ManagerEmailExists);
        assert!(err.message.starts_with("매장 생성 실패: "));

        let dup = fx.functions.check_email_duplicate("boss@store.kr").await.unwrap();
        assert_eq!(dup, EmailDuplicate { is_duplicate: true, count: 1 });
        let free = fx.functions.check_email_duplicate("new@store.kr").await.unwrap();
        assert!(!free.is_duplicate);
    }

    #[tokio::test]
    async fn test_missing_fields() {
        let fx = fixture();
        let err = fx
            .functions
            .create_store_with_account(create_request("  "))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::RequiredField);
        assert_eq!(err.message, "필수 정보가 누락되었습니다.");
        assert_eq!(fx.access.store().query(collections::STORES, &Query::new()).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_mail_failure_surfaces_verbatim() {
        let fx = fixture();
        fx.mailer.set_failing(true);
        let err = fx
            .functions
            .resend_password_setup_email(PasswordSetupMailRequest {
                store_id: "s1".into(),
                store_name: "강남점".into(),
                manager_email: "boss@store.kr".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EmailSendFailed);
        assert!(err.message.starts_with("이메일 재발송 실패"));
    }

    #[tokio::test]
    async fn test_staff_username_unique_per_store() {
        let fx = fixture();
        let req = StaffAccountCreate {
            store_id: "A".into(),
            name: "Kim".into(),
            username: "kim".into(),
        };
        let res = fx.functions.create_staff_account(req.clone()).await.unwrap();
        let account: Account = fx
            .access
            .get_as(collections::ACCOUNTS, &res.account_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.uid.as_deref(), Some(res.account_id.as_str()));

        let err = fx.functions.create_staff_account(req.clone()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::UsernameExists);

        let other_store = StaffAccountCreate {
            store_id: "B".into(),
            ..req
        };
        assert!(fx.functions.create_staff_account(other_store).await.is_ok());
    }

    #[tokio::test]
    async fn test_complete_password_setup() {
        let fx = fixture();
        let res = fx
            .functions
            .create_store_with_account(create_request("boss@store.kr"))
            .await
            .unwrap();
        let token = setup_token::issue("setup-secret", "boss@store.kr", &res.store_id).unwrap();

        let short = CompletePasswordSetupRequest {
            email: "boss@store.kr".into(),
            store_id: res.store_id.clone(),
            token: token.clone(),
            password: "short".into(),
        };
        assert_eq!(
            fx.functions.complete_password_setup(short).await.unwrap_err().code,
            ErrorCode::ValueOutOfRange
        );

        let req = CompletePasswordSetupRequest {
            email: "boss@store.kr".into(),
            store_id: res.store_id,
            token,
            password: "new-password-1".into(),
        };
        fx.functions.complete_password_setup(req).await.unwrap();
        let user = fx.provider.sign_in("boss@store.kr", "new-password-1").await.unwrap();
        assert!(!user.uid.is_empty());
    }
}
