pub mod admin;
pub mod auth;
pub mod client;
pub mod error;
pub mod job;
pub mod validation;

pub use admin::AdminService;
pub use auth::{AuthService, Identity, Role, Session};
pub use client::ApiClient;
pub use error::ApiError;
