//! Lockbox record server.
//!
//! Stores sealed records per account and advances each record's version by
//! exactly one per accepted write. The server never holds user keys or
//! plaintext.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod password;
pub mod server;
pub mod service;
pub mod storage;

pub use config::ServerConfig;
pub use error::ApiError;
pub use server::build_router;
pub use service::{BuildInfo, RecordService};
