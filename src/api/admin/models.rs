use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::auth::Role;
use crate::api::job::JobRecord;

/// Account as listed by `/admin/users`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserAccount {
    /// Case-insensitive match on name or email; a blank term matches everyone
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.is_empty()
            || self.name.to_lowercase().contains(&term)
            || self.email.to_lowercase().contains(&term)
    }
}

/// Payload for `POST /categories`
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CategoryDraft {
    #[validate(length(min = 1, max = 60, message = "Category name is required"))]
    pub name: String,
    pub description: String,
    pub icon: String,
}

impl CategoryDraft {
    pub fn normalize(&mut self) {
        for field in [&mut self.name, &mut self.description, &mut self.icon] {
            *field = field.trim().to_string();
        }
    }
}

/// Site-wide counters for the admin dashboard
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminStats {
    pub total_users: u64,
    pub total_jobs: u64,
    pub total_accepted_jobs: u64,
    pub total_categories: u64,
    pub recent_jobs: Vec<JobRecord>,
}
