//! Public file route
//!
//! Serves store logos out of object storage for the local backend. Backup
//! archives live under the same root and are never served.

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};
use http::header;

use shared::error::{AppError, AppResult};

use crate::state::AppState;

pub const PUBLIC_PREFIX: &str = "stores/logos/";

pub fn router() -> Router<AppState> {
    Router::new().route("/files/{*key}", get(serve_file))
}

async fn serve_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<impl IntoResponse> {
    if !key.starts_with(PUBLIC_PREFIX) {
        tracing::debug!(key = %key, "Non-public file requested");
        return Err(AppError::not_found(format!("object {key}")));
    }
    let bytes = state.storage.get(&key).await?;
    let mime = mime_guess::from_path(&key).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime.essence_str().to_string())], bytes))
}
