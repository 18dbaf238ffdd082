pub mod models;
pub mod service;

pub use models::{AdminStats, CategoryDraft, UserAccount};
pub use service::AdminService;
