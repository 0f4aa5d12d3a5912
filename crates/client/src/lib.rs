//! Supabase access layer for shopshift
//!
//! Wraps the two Supabase services the scheduler talks to:
//!
//! - PostgREST table and RPC requests, behind the [`Store`] trait
//! - GoTrue user lookup, behind the [`IdentityProvider`] trait
//!
//! [`MemoryStore`] and [`StaticIdentity`] implement the same traits without a
//! network and back the scheduler's tests.

pub mod auth;
pub mod config;
pub mod error;
pub mod fetch;
pub mod postgrest;
pub mod store;

use reqwest::Client;

pub use auth::{Auth, AuthUser, IdentityProvider, Session, StaticIdentity, User};
pub use config::{ClientConfig, ClientOptions};
pub use error::{ApiErrorDetails, Error};
pub use postgrest::{PostgrestClient, Query, SortOrder};
pub use store::{MemoryStore, Store, StoreOperation};

/// Entry point bundling the REST and auth clients for one project
#[derive(Clone)]
pub struct BackendClient {
    config: ClientConfig,
    http_client: Client,
    auth: Auth,
    options: ClientOptions,
}

impl BackendClient {
    /// Create a client with default options
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        Self::new_with_options(config, ClientOptions::default())
    }

    /// Create a client with custom options
    pub fn new_with_options(config: ClientConfig, options: ClientOptions) -> Result<Self, Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        let auth = Auth::new(
            &config.base_url(),
            &config.anon_key,
            http_client.clone(),
            options.clone(),
        );

        Ok(Self {
            config,
            http_client,
            auth,
            options,
        })
    }

    /// Build from `SUPABASE_URL` and `SUPABASE_ANON_KEY`
    pub fn from_env() -> Result<Self, Error> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Get a reference to the auth client
    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// REST client; carries the session token when one is set
    pub fn postgrest(&self) -> Result<PostgrestClient, Error> {
        let client = PostgrestClient::new(
            &self.config.base_url(),
            &self.config.anon_key,
            self.http_client.clone(),
            self.options.clone(),
        );
        match self.auth.get_session() {
            Some(session) => client.with_auth(&session.access_token),
            None => Ok(client),
        }
    }

    /// A copy of this client acting as the holder of `token`
    pub fn with_access_token(&self, token: &str) -> Self {
        Self {
            auth: self.auth.with_access_token(token),
            ..self.clone()
        }
    }
}
