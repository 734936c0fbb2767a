//! Transactional mail
//!
//! Two templates: the password-setup link sent to a new store manager and the
//! "store ready" notice sent when a store goes live. Delivery goes through a
//! [`Mailer`]; production uses SES, development only logs.

use async_trait::async_trait;
use aws_sdk_sesv2::Client as SesClient;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use parking_lot::Mutex;

use shared::error::{AppError, AppResult, ErrorCode};

pub const DEFAULT_MAIL_FROM: &str = "noreply@storeflow.kr";

/// Rendered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &Mail) -> AppResult<()>;
}

fn send_failed(e: impl std::fmt::Display) -> AppError {
    AppError::with_message(ErrorCode::EmailSendFailed, format!("이메일 발송 실패: {e}"))
}

/// Amazon SES v2
pub struct SesMailer {
    client: SesClient,
    from: String,
}

impl SesMailer {
    pub fn new(client: SesClient, from: impl Into<String>) -> Self {
        Self {
            client,
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send(&self, mail: &Mail) -> AppResult<()> {
        let subject = Content::builder()
            .data(&mail.subject)
            .charset("UTF-8")
            .build()
            .map_err(send_failed)?;
        let html = Content::builder()
            .data(&mail.html)
            .charset("UTF-8")
            .build()
            .map_err(send_failed)?;
        let message = Message::builder()
            .subject(subject)
            .body(Body::builder().html(html).build())
            .build();

        self.client
            .send_email()
            .from_email_address(&self.from)
            .destination(Destination::builder().to_addresses(&mail.to).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(to = %mail.to, error = %e, "SES send failed");
                send_failed(e)
            })?;

        tracing::info!(to = %mail.to, subject = %mail.subject, "Mail sent");
        Ok(())
    }
}

/// Development mailer: writes the message to the log instead of sending it
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &Mail) -> AppResult<()> {
        tracing::info!(to = %mail.to, subject = %mail.subject, "Mail (not sent, development)");
        tracing::debug!(html = %mail.html);
        Ok(())
    }
}

/// Keeps every message in memory. Can be switched to fail.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Mail>>,
    failing: Mutex<bool>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: &Mail) -> AppResult<()> {
        if *self.failing.lock() {
            return Err(send_failed("mailer offline"));
        }
        self.sent.lock().push(mail.clone());
        Ok(())
    }
}

// ========== Templates ==========

const STYLE: &str = "body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }\
 .container { max-width: 600px; margin: 0 auto; padding: 20px; }\
 .header { background: #667eea; color: white; padding: 30px; text-align: center; }\
 .content { background: #f9f9f9; padding: 30px; }\
 .button { display: inline-block; padding: 12px 30px; background: #1890ff; color: white; text-decoration: none; }\
 .info-box { background: white; padding: 15px; margin: 20px 0; border-left: 4px solid #1890ff; }";

fn layout(title: &str, content: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><style>{STYLE}</style></head><body>\
         <div class=\"container\">\
         <div class=\"header\"><h1>storeFlow</h1><p>매장 관리 시스템</p></div>\
         <div class=\"content\"><h2>{title}</h2>{content}\
         <hr><p style=\"font-size: 12px; color: #999;\">이 이메일은 storeFlow 시스템에서 자동으로 발송되었습니다.<br>\
         문의사항이 있으시면 관리자에게 연락하세요.</p></div></div></body></html>"
    )
}

/// `{app_url}/auth/set-password?email=..&storeId=..&token=..`
pub fn password_setup_link(app_url: &str, email: &str, store_id: &str, token: &str) -> String {
    format!(
        "{}/auth/set-password?email={}&storeId={}&token={}",
        app_url.trim_end_matches('/'),
        urlencoding::encode(email),
        urlencoding::encode(store_id),
        token
    )
}

pub fn password_setup_mail(to: &str, store_name: &str, link: &str, resend: bool) -> Mail {
    let suffix = if resend { " (재발송)" } else { "" };
    let content = format!(
        "<p>안녕하세요,</p>\
         <p><strong>{store_name}</strong> 매장의 담당자로 지정되었습니다.</p>\
         <h3>다음 단계: 비밀번호 설정</h3>\
         <p>아래 버튼을 클릭하여 비밀번호를 설정하세요.</p>\
         <p style=\"text-align: center;\"><a href=\"{link}\" class=\"button\">비밀번호 설정하기</a></p>\
         <p style=\"font-size: 12px; color: #666;\">링크가 작동하지 않으면 아래 URL을 복사하여 브라우저에 붙여넣으세요:<br>\
         <a href=\"{link}\">{link}</a></p>\
         <p style=\"font-size: 12px; color: #666;\">이 링크는 24시간 동안 유효합니다.</p>"
    );
    Mail {
        to: to.to_string(),
        subject: format!("[storeFlow] {store_name} 매장 비밀번호 설정 안내{suffix}"),
        html: layout("비밀번호 설정 안내", &content),
    }
}

pub fn store_creation_mail(
    to: &str,
    store_name: &str,
    business_number: Option<&str>,
    app_url: &str,
) -> Mail {
    let business_number = business_number.filter(|b| !b.is_empty()).unwrap_or("-");
    let login_url = format!("{}/auth/login", app_url.trim_end_matches('/'));
    let content = format!(
        "<p>안녕하세요,</p>\
         <p><strong>{store_name}</strong> 매장이 성공적으로 생성되어 운영을 시작할 수 있습니다.</p>\
         <div class=\"info-box\"><h3>매장 정보</h3>\
         <p><strong>매장명:</strong> {store_name}</p>\
         <p><strong>사업자 등록번호:</strong> {business_number}</p>\
         <p><strong>담당자 이메일:</strong> {to}</p></div>\
         <p>이제 매장 관리 시스템에 로그인하여 매장을 운영하실 수 있습니다.</p>\
         <p>로그인 URL: <a href=\"{login_url}\">{login_url}</a></p>"
    );
    Mail {
        to: to.to_string(),
        subject: format!("[storeFlow] {store_name} 매장 생성 완료 안내"),
        html: layout("매장 생성 완료 안내", &content),
    }
}
