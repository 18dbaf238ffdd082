use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use validator::Validate;

use crate::api::auth::Role;
use crate::api::client::ApiClient;
use crate::api::error::ApiError;

use super::models::{AdminStats, CategoryDraft, UserAccount};

#[derive(Serialize)]
struct RoleChange {
    role: Role,
}

/// Endpoints reserved for admin accounts
///
/// Only built for a caller whose role is `admin`. The backend checks the
/// token as well; this just refuses early without sending anything.
#[derive(Clone, Debug)]
pub struct AdminService {
    client: ApiClient,
}

impl AdminService {
    pub fn new(client: ApiClient, role: Role) -> Result<Self, ApiError> {
        if role.normalized() != Role::Admin {
            warn!("Admin: refused for role {}", role);
            return Err(ApiError::Rejected("Admin access required".to_string()));
        }
        Ok(Self { client })
    }

    pub async fn users(&self) -> Result<Vec<UserAccount>, ApiError> {
        self.client.get_json(&["admin", "users"]).await
    }

    pub async fn set_role(&self, email: &str, role: Role) -> Result<(), ApiError> {
        if role == Role::Unknown {
            return Err(ApiError::Rejected("Role must be user or admin".to_string()));
        }

        let _: Value = self
            .client
            .send_json(
                Method::PATCH,
                &["admin", "users", email, "role"],
                &RoleChange { role },
            )
            .await?;

        info!("Admin: {} is now {}", email, role);
        Ok(())
    }

    pub async fn delete_user(&self, email: &str) -> Result<(), ApiError> {
        let _: Value = self.client.delete_json(&["admin", "users", email]).await?;
        info!("Admin: user {} deleted", email);
        Ok(())
    }

    pub async fn add_category(&self, mut draft: CategoryDraft) -> Result<(), ApiError> {
        draft.normalize();
        draft.validate()?;

        let _: Value = self
            .client
            .send_json(Method::POST, &["categories"], &draft)
            .await?;

        info!("Admin: category {} added", draft.name);
        Ok(())
    }

    /// Dashboard counters across the whole marketplace
    pub async fn stats(&self) -> Result<AdminStats, ApiError> {
        self.client.get_json(&["dashboard", "admin", "stats"]).await
    }
}
