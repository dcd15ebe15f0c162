//! Bearer token authentication.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use polling_common::{AppError, AppResult, config::AuthConfig};
use polling_db::models::User;

/// Resolves an access token to the user it belongs to.
///
/// Sessions and credentials are owned by an external service; this is the
/// only view of them the polling service needs.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns [`AppError::Unauthorized`] for unknown tokens.
    async fn authenticate(&self, token: &str) -> AppResult<User>;
}

/// Authenticator over a fixed token table.
#[derive(Clone, Default)]
pub struct StaticTokenAuthenticator {
    users: HashMap<String, User>,
}

impl StaticTokenAuthenticator {
    #[must_use]
    pub fn new(users: HashMap<String, User>) -> Self {
        Self { users }
    }

    /// Build the token table from configuration.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        let now = Utc::now();
        let users = config
            .users
            .iter()
            .map(|u| {
                let user = User {
                    id: u.id.clone(),
                    email: u.email.clone(),
                    name: u.name.clone(),
                    created_at: now,
                    updated_at: now,
                };
                (u.token.clone(), user)
            })
            .collect();
        Self { users }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, token: &str) -> AppResult<User> {
        self.users.get(token).cloned().ok_or(AppError::Unauthorized)
    }
}
