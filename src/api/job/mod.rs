pub mod dto;
pub mod models;
pub mod service;

// Re-export commonly used types
pub use dto::{JobsPayload, ResultPage};
pub use models::{
    AcceptedJob, BudgetType, Category, JobDraft, JobRecord, SortOrder, UserStats, WorkLocation,
};
pub use service::JobService;
