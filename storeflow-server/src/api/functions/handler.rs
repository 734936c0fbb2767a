//! Function handlers

use axum::{Json, extract::State};
use serde::Deserialize;

use shared::error::AppResult;
use shared::models::StaffAccountCreate;

use crate::functions::{
    CompletePasswordSetupRequest, CreateStaffResponse, CreateStoreRequest, CreateStoreResponse,
    EmailDuplicate, FunctionResult, PasswordSetupMailRequest, StoreCreationMailRequest,
};
use crate::state::AppState;

/// POST /functions/createStoreWithAccount
pub async fn create_store_with_account(
    State(state): State<AppState>,
    Json(payload): Json<CreateStoreRequest>,
) -> AppResult<Json<CreateStoreResponse>> {
    let res = state.functions.create_store_with_account(payload).await?;
    Ok(Json(res))
}

/// POST /functions/sendPasswordSetupEmail
pub async fn send_password_setup_email(
    State(state): State<AppState>,
    Json(payload): Json<PasswordSetupMailRequest>,
) -> AppResult<Json<FunctionResult>> {
    let res = state.functions.send_password_setup_email(payload).await?;
    Ok(Json(res))
}

/// POST /functions/resendPasswordSetupEmail
pub async fn resend_password_setup_email(
    State(state): State<AppState>,
    Json(payload): Json<PasswordSetupMailRequest>,
) -> AppResult<Json<FunctionResult>> {
    let res = state.functions.resend_password_setup_email(payload).await?;
    Ok(Json(res))
}

/// POST /functions/sendStoreCreationEmail
pub async fn send_store_creation_email(
    State(state): State<AppState>,
    Json(payload): Json<StoreCreationMailRequest>,
) -> AppResult<Json<FunctionResult>> {
    let res = state.functions.send_store_creation_email(payload).await?;
    Ok(Json(res))
}

/// POST /functions/completePasswordSetup
pub async fn complete_password_setup(
    State(state): State<AppState>,
    Json(payload): Json<CompletePasswordSetupRequest>,
) -> AppResult<Json<FunctionResult>> {
    let res = state.functions.complete_password_setup(payload).await?;
    Ok(Json(res))
}

/// POST /functions/createStaffAccount
pub async fn create_staff_account(
    State(state): State<AppState>,
    Json(payload): Json<StaffAccountCreate>,
) -> AppResult<Json<CreateStaffResponse>> {
    let res = state.functions.create_staff_account(payload).await?;
    Ok(Json(res))
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    #[serde(default)]
    pub email: String,
}

/// POST /functions/checkEmailDuplicate
pub async fn check_email_duplicate(
    State(state): State<AppState>,
    Json(payload): Json<EmailQuery>,
) -> AppResult<Json<EmailDuplicate>> {
    let res = state.functions.check_email_duplicate(&payload.email).await?;
    Ok(Json(res))
}
