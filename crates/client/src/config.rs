//! Connection settings for the Supabase backend

use std::time::Duration;
use url::Url;

use crate::error::Error;

/// Project URL and public API key
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: Url,
    pub anon_key: String,
}

impl ClientConfig {
    /// Creates a new configuration, validating the URL.
    pub fn new(url_str: &str, anon_key: impl Into<String>) -> Result<Self, Error> {
        let url = Url::parse(url_str)?;
        let anon_key = anon_key.into();
        if anon_key.is_empty() {
            return Err(Error::config("anon_key cannot be empty"));
        }
        Ok(Self { url, anon_key })
    }

    /// Reads `SUPABASE_URL` and `SUPABASE_ANON_KEY`, loading a `.env` file first if one exists.
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        let url_str = std::env::var("SUPABASE_URL")
            .map_err(|_| Error::config("SUPABASE_URL environment variable not found"))?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY")
            .map_err(|_| Error::config("SUPABASE_ANON_KEY environment variable not found"))?;
        Self::new(&url_str, anon_key)
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> String {
        self.url.as_str().trim_end_matches('/').to_string()
    }
}

/// Request-level options for the client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// The database schema
    pub db_schema: String,

    /// Value sent in the `X-Client-Info` header
    pub client_info: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            db_schema: "public".to_string(),
            client_info: format!("shopshift/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientOptions {
    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the database schema
    pub fn with_db_schema(mut self, value: &str) -> Self {
        self.db_schema = value.to_string();
        self
    }

    /// Set the client info header value
    pub fn with_client_info(mut self, value: &str) -> Self {
        self.client_info = value.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_key() {
        let err = ClientConfig::new("https://example.supabase.co", "").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_bad_url() {
        assert!(matches!(
            ClientConfig::new("not a url", "key"),
            Err(Error::Url(_))
        ));
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let config = ClientConfig::new("https://example.supabase.co/", "key").unwrap();
        assert_eq!(config.base_url(), "https://example.supabase.co");
    }
}
