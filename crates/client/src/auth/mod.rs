//! Authentication against Supabase GoTrue

mod session;
mod types;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::config::ClientOptions;
use crate::error::Error;
use crate::fetch::Fetch;

pub use session::*;
pub use types::*;

/// Resolves the user a request acts on behalf of.
///
/// `Ok(None)` means nobody is signed in; callers treat that as unauthorized.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> Result<Option<AuthUser>, Error>;
}

/// Fixed identity, for service jobs and tests
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<AuthUser>,
}

impl StaticIdentity {
    pub fn signed_in(user: AuthUser) -> Self {
        Self { user: Some(user) }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user(&self) -> Result<Option<AuthUser>, Error> {
        Ok(self.user.clone())
    }
}

/// Client for Supabase Authentication
#[derive(Clone)]
pub struct Auth {
    /// The base URL for the Supabase project
    url: String,

    /// The anonymous API key for the Supabase project
    key: String,

    /// HTTP client used for requests
    client: Client,

    /// The current session
    session: Arc<RwLock<Option<Session>>>,

    options: ClientOptions,
}

impl Auth {
    /// Create a new Auth client
    pub fn new(url: &str, key: &str, client: Client, options: ClientOptions) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            client,
            session: Arc::new(RwLock::new(None)),
            options,
        }
    }

    fn get_auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.url, path)
    }

    /// Get the current session
    pub fn get_session(&self) -> Option<Session> {
        match self.session.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Set the session
    pub fn set_session(&self, session: Session) {
        match self.session.write() {
            Ok(mut guard) => *guard = Some(session),
            Err(poisoned) => *poisoned.into_inner() = Some(session),
        }
    }

    /// Forget the current session
    pub fn clear_session(&self) {
        match self.session.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    /// A copy of this client bound to a different access token
    pub fn with_access_token(&self, token: &str) -> Self {
        let auth = Self {
            session: Arc::new(RwLock::new(None)),
            ..self.clone()
        };
        auth.set_session(Session::from_access_token(token));
        auth
    }

    /// Get the user data for an access token
    pub async fn get_user(&self, token: &str) -> Result<User, Error> {
        let url = self.get_auth_url("/user");

        Fetch::get(&self.client, &url)
            .header("apikey", &self.key)
            .header("X-Client-Info", &self.options.client_info)
            .bearer_auth(token)
            .timeout(self.options.request_timeout)
            .execute::<User>()
            .await
    }
}

#[async_trait]
impl IdentityProvider for Auth {
    async fn current_user(&self) -> Result<Option<AuthUser>, Error> {
        let session = match self.get_session() {
            Some(session) if !session.is_expired() => session,
            _ => return Ok(None),
        };

        match self.get_user(&session.access_token).await {
            Ok(user) => Ok(Some(user.into())),
            Err(e) if matches!(e.status(), Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)) => {
                debug!("access token rejected by auth server");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
