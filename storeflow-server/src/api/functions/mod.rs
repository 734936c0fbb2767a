//! Store provisioning functions
//!
//! One POST per function, named the way the admin app calls them. A failure
//! comes back as the `AppError` envelope and is never retried here.

mod handler;

use axum::{Router, routing::post};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().nest("/functions", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/createStoreWithAccount", post(handler::create_store_with_account))
        .route("/sendPasswordSetupEmail", post(handler::send_password_setup_email))
        .route("/resendPasswordSetupEmail", post(handler::resend_password_setup_email))
        .route("/sendStoreCreationEmail", post(handler::send_store_creation_email))
        .route("/completePasswordSetup", post(handler::complete_password_setup))
        .route("/createStaffAccount", post(handler::create_staff_account))
        .route("/checkEmailDuplicate", post(handler::check_email_duplicate))
}
