//! storeflow server
//!
//! Multi-tenant store back office: reservations, a prepaid balance ledger,
//! HR records and store provisioning, isolated per store.
//!
//! - [`docstore`]: document access layer with tenant scoping
//! - [`auth`]: identity, sessions, capabilities, route guards
//! - [`services`]: domain operations over a [`services::ServiceContext`]
//! - [`functions`]: store/account provisioning and mail
//! - [`storage`]: object storage for logos and backups
//! - [`api`]: HTTP routes

pub mod api;
pub mod auth;
pub mod config;
pub mod docstore;
pub mod functions;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

pub use config::Config;
pub use state::AppState;
