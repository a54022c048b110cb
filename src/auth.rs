//! Authentication collaborator.
//!
//! `AuthService::login` returns the authenticated profile itself, so callers
//! decide what to do next from that value instead of re-reading shared state.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{decode, ApiClient};
use crate::error::{ApiError, AuthError};
use crate::models::EntityId;
use crate::token_store::TOKEN_KEY;

/// Role of an authenticated user. Only doctors may use the admin panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Doctor,
    Other(String),
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        if value == "doctor" {
            Role::Doctor
        } else {
            Role::Other(value)
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Doctor => "doctor".to_string(),
            Role::Other(value) => value,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Doctor => f.write_str("doctor"),
            Role::Other(value) => f.write_str(value),
        }
    }
}

fn default_role() -> Role {
    Role::Other(String::new())
}

/// The user returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthProfile {
    #[serde(default, deserialize_with = "crate::models::entity_id")]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// `Ok(None)` means the backend rejected the credentials.
    async fn login(&self, email: &str, password: &str) -> Result<Option<AuthProfile>, AuthError>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Backends name the token `token` or `access_token`, sometimes both.
#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<AuthProfile>,
}

impl LoginResponse {
    /// Token and profile, when the body carries both.
    fn into_session(self) -> Option<(String, AuthProfile)> {
        let token = self
            .token
            .or(self.access_token)
            .filter(|token| !token.is_empty())?;
        Some((token, self.user?))
    }
}

/// `POST /login` against the backend; stores the returned token.
pub struct RestAuthService {
    api: Arc<ApiClient>,
}

impl RestAuthService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl AuthService for RestAuthService {
    async fn login(&self, email: &str, password: &str) -> Result<Option<AuthProfile>, AuthError> {
        let body = match self
            .api
            .post_json("login", &LoginRequest { email, password })
            .await
        {
            Ok(body) => body,
            Err(ApiError::Status { status, .. }) if status == 401 || status == 403 => {
                warn!(status, "login rejected");
                return Ok(None);
            }
            Err(ApiError::Http(e)) => return Err(AuthError::Network(e.to_string())),
            Err(e) => return Err(e.into()),
        };

        // Some backends answer 200 with an empty or token-less body on bad
        // credentials.
        if body.is_null() {
            warn!("login response was empty");
            return Ok(None);
        }
        let Some((token, user)) = decode::<LoginResponse>(body)?.into_session() else {
            warn!("login response carried no token or user");
            return Ok(None);
        };

        self.api
            .tokens()
            .set(TOKEN_KEY, &token)
            .map_err(ApiError::from)?;

        info!(role = %user.role, "logged in");
        Ok(Some(user))
    }
}

/// Fixed credential table, used by the offline demo and in tests.
pub struct StaticAuthService {
    accounts: Vec<(String, String, AuthProfile)>,
}

impl StaticAuthService {
    pub fn new() -> Self {
        Self {
            accounts: Vec::new(),
        }
    }

    pub fn with_account(mut self, email: &str, password: &str, role: Role) -> Self {
        let profile = AuthProfile {
            id: Some(self.accounts.len() as i64 + 1),
            email: email.to_string(),
            name: email.split('@').next().unwrap_or_default().to_string(),
            role,
        };
        self.accounts
            .push((email.to_string(), password.to_string(), profile));
        self
    }
}

impl Default for StaticAuthService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthService for StaticAuthService {
    async fn login(&self, email: &str, password: &str) -> Result<Option<AuthProfile>, AuthError> {
        Ok(self
            .accounts
            .iter()
            .find(|(e, p, _)| e == email && p == password)
            .map(|(_, _, profile)| profile.clone()))
    }
}
