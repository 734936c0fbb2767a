//! Shared types for storeflow
//!
//! Domain models, the unified error system and small utilities used by the
//! server and mirrored by the frontend.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::{Json, body};
pub use http;
pub use serde::{Deserialize, Serialize};
