use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use super::client::ApiClient;
use super::error::ApiError;

/// Password the backend expects for accounts created through a federated
/// identity provider
pub const FEDERATED_PASSWORD: &str = "firebase-user";

/// Bearer token store shared by every authenticated client
///
/// `signed_in` flips to `false` whenever the backend rejects the token
/// (401/403) or the user signs out, so the rest of the app can react.
#[derive(Clone, Debug)]
pub struct Session {
    token: Arc<RwLock<Option<String>>>,
    signed_in: Arc<watch::Sender<bool>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (signed_in, _) = watch::channel(false);
        Self {
            token: Arc::new(RwLock::new(None)),
            signed_in: Arc::new(signed_in),
        }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.store_token(token);
        session
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_signed_in(&self) -> bool {
        *self.signed_in.borrow()
    }

    pub fn store_token(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
        self.signed_in.send_replace(true);
    }

    /// Forget the token and notify subscribers
    pub fn sign_out(&self) {
        self.token
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.signed_in.send_replace(false);
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.signed_in.subscribe()
    }
}

/// Role attached to a backend account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    #[serde(other)]
    Unknown,
}

impl Role {
    /// Anything the backend sends that we don't recognise is a plain user
    pub fn normalized(self) -> Self {
        match self {
            Role::Unknown => Role::User,
            role => role,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}' (expected user or admin)", other)),
        }
    }
}

/// Identity coming from the external identity provider
#[derive(Debug, Clone)]
pub struct Identity {
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
    #[serde(rename = "photoURL")]
    photo_url: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    #[serde(default)]
    success: bool,
    token: Option<String>,
    user: Option<AccountUser>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct AccountUser {
    #[serde(default)]
    role: Role,
}

#[derive(Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    role: Role,
}

/// Keeps the backend JWT in sync with the identity provider's user
pub struct AuthService {
    client: ApiClient,
    session: Session,
}

impl AuthService {
    pub fn new(client: ApiClient, session: Session) -> Self {
        Self { client, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Log the identity into the backend, registering it on first sight
    ///
    /// On success the issued JWT is stored in the session and the account's
    /// role is returned.
    pub async fn sync_user(
        &self,
        identity: &Identity,
        password: Option<&str>,
    ) -> Result<Role, ApiError> {
        let password = password.unwrap_or(FEDERATED_PASSWORD);

        let login = self
            .client
            .send_json::<AuthResponse, _>(
                Method::POST,
                &["auth", "login"],
                &LoginRequest {
                    email: &identity.email,
                    password,
                },
            )
            .await;

        match login {
            Ok(response) if response.success => {
                info!("Auth: logged in {}", identity.email);
                return self.accept(response);
            }
            Ok(response) => warn!(
                "Auth: login refused for {}: {}",
                identity.email,
                response.message.as_deref().unwrap_or("no reason given")
            ),
            Err(e) => warn!("Auth: login failed for {}: {}", identity.email, e),
        }

        info!("Auth: registering {} with the backend", identity.email);
        let response = self
            .client
            .send_json::<AuthResponse, _>(
                Method::POST,
                &["auth", "register"],
                &RegisterRequest {
                    name: identity.display_name.as_deref().unwrap_or("User"),
                    email: &identity.email,
                    password,
                    photo_url: identity.photo_url.as_deref().unwrap_or(""),
                },
            )
            .await?;

        if !response.success {
            return Err(ApiError::Rejected(
                response
                    .message
                    .unwrap_or_else(|| "Backend sync failed".to_string()),
            ));
        }
        self.accept(response)
    }

    pub async fn fetch_role(&self, email: &str) -> Result<Role, ApiError> {
        let profile: ProfileResponse = self
            .client
            .get_json(&["users", "profile", email])
            .await?;
        Ok(profile.role.normalized())
    }

    pub fn sign_out(&self) {
        info!("Auth: signing out");
        self.session.sign_out();
    }

    fn accept(&self, response: AuthResponse) -> Result<Role, ApiError> {
        let token = response
            .token
            .ok_or_else(|| ApiError::Rejected("Backend did not issue a token".to_string()))?;
        self.session.store_token(token);
        Ok(response
            .user
            .map(|user| user.role.normalized())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_tracks_token_and_sign_out() {
        let session = Session::new();
        let mut signed_in = session.subscribe();
        assert!(session.token().is_none());
        assert!(!session.is_signed_in());

        session.store_token("abc");
        assert_eq!(session.token().as_deref(), Some("abc"));
        assert!(*signed_in.borrow_and_update());

        session.sign_out();
        assert!(session.token().is_none());
        assert!(signed_in.has_changed().unwrap());
        assert!(!*signed_in.borrow_and_update());
    }

    #[test]
    fn clones_share_the_token() {
        let session = Session::new();
        let other = session.clone();
        other.store_token("shared");
        assert_eq!(session.token().as_deref(), Some("shared"));
    }

    #[test]
    fn unknown_roles_fall_back_to_user() {
        let role: Role = serde_json::from_str("\"moderator\"").unwrap();
        assert_eq!(role.normalized(), Role::User);
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role.normalized(), Role::Admin);
    }

    #[test]
    fn only_known_roles_parse() {
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert!("moderator".parse::<Role>().is_err());
        assert_eq!(Role::Admin.to_string(), "admin");
    }
}
