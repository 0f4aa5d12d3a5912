//! Database operations through the PostgREST API

mod filter;
mod query;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientOptions;
use crate::error::Error;
use crate::fetch::Fetch;

pub use filter::*;
pub use query::*;

/// Client for table and RPC requests
#[derive(Clone)]
pub struct PostgrestClient {
    /// The base URL for the Supabase project
    url: String,

    /// HTTP client
    client: Client,

    /// Headers sent with every request
    headers: HeaderMap,

    options: ClientOptions,
}

impl PostgrestClient {
    /// Create a new PostgrestClient
    pub fn new(url: &str, key: &str, client: Client, options: ClientOptions) -> Self {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(key) {
            headers.insert("apikey", value.clone());
        }
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", key)) {
            headers.insert("Authorization", value);
        }
        if let Ok(value) = HeaderValue::from_str(&options.client_info) {
            headers.insert("X-Client-Info", value);
        }
        if options.db_schema != "public" {
            if let Ok(value) = HeaderValue::from_str(&options.db_schema) {
                headers.insert("Accept-Profile", value.clone());
                headers.insert("Content-Profile", value);
            }
        }

        Self {
            url: url.trim_end_matches('/').to_string(),
            client,
            headers,
            options,
        }
    }

    /// Add a custom header to every request
    pub fn with_header(mut self, key: &str, value: &str) -> Result<Self, Error> {
        let header_name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| Error::InvalidParameters(format!("Invalid header name: {}", key)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| Error::InvalidParameters(format!("Invalid header value: {}", value)))?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Authenticate requests as a user so row-level security applies
    pub fn with_auth(self, token: &str) -> Result<Self, Error> {
        self.with_header("Authorization", &format!("Bearer {}", token))
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url, table)
    }

    fn rows(value: Value) -> Vec<Value> {
        match value {
            Value::Null => Vec::new(),
            Value::Array(rows) => rows,
            other => vec![other],
        }
    }

    /// Read rows
    pub async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, Error> {
        debug!(table, "select");
        let value = Fetch::get(&self.client, &self.table_url(table))
            .headers(&self.headers)
            .query(query.to_params())
            .timeout(self.options.request_timeout)
            .execute_value()
            .await?;
        Ok(Self::rows(value))
    }

    /// Insert one row or a batch and return the stored rows
    pub async fn insert(&self, table: &str, rows: &Value) -> Result<Vec<Value>, Error> {
        debug!(table, "insert");
        let value = Fetch::post(&self.client, &self.table_url(table))
            .headers(&self.headers)
            .header("Prefer", "return=representation")
            .timeout(self.options.request_timeout)
            .json(rows)?
            .execute_value()
            .await?;
        Ok(Self::rows(value))
    }

    /// Patch every row matching the query and return the updated rows
    pub async fn update(
        &self,
        table: &str,
        query: &Query,
        patch: &Value,
    ) -> Result<Vec<Value>, Error> {
        if !query.has_filters() {
            return Err(Error::InvalidParameters(format!(
                "update on {} requires at least one filter",
                table
            )));
        }
        debug!(table, "update");
        let value = Fetch::patch(&self.client, &self.table_url(table))
            .headers(&self.headers)
            .header("Prefer", "return=representation")
            .query(query.filter_params())
            .timeout(self.options.request_timeout)
            .json(patch)?
            .execute_value()
            .await?;
        Ok(Self::rows(value))
    }

    /// Delete every row matching the query and return the deleted rows
    pub async fn delete(&self, table: &str, query: &Query) -> Result<Vec<Value>, Error> {
        if !query.has_filters() {
            return Err(Error::InvalidParameters(format!(
                "delete on {} requires at least one filter",
                table
            )));
        }
        debug!(table, "delete");
        let value = Fetch::delete(&self.client, &self.table_url(table))
            .headers(&self.headers)
            .header("Prefer", "return=representation")
            .query(query.filter_params())
            .timeout(self.options.request_timeout)
            .execute_value()
            .await?;
        Ok(Self::rows(value))
    }

    /// Call a stored procedure or function
    pub async fn rpc(&self, function: &str, params: &Value) -> Result<Value, Error> {
        debug!(function, "rpc");
        let url = format!("{}/rest/v1/rpc/{}", self.url, function);
        Fetch::post(&self.client, &url)
            .headers(&self.headers)
            .timeout(self.options.request_timeout)
            .json(params)?
            .execute_value()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> PostgrestClient {
        PostgrestClient::new(
            &server.uri(),
            "anon-key",
            Client::new(),
            ClientOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_select_sends_filters() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/shifts"))
            .and(query_param("select", "*"))
            .and(query_param("shop_id", "eq.shop-1"))
            .and(header("apikey", "anon-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{ "id": "a" }, { "id": "b" }])),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let rows = client(&mock_server)
            .select("shifts", &Query::new().eq("shop_id", "shop-1"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_insert_returns_representation() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/shifts"))
            .and(header("Prefer", "return=representation"))
            .and(body_json(json!([{ "notes": "x" }])))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!([{ "id": "new", "notes": "x" }])),
            )
            .mount(&mock_server)
            .await;

        let rows = client(&mock_server)
            .insert("shifts", &json!([{ "notes": "x" }]))
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], "new");
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/shifts"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "code": "42501",
                "message": "new row violates row-level security policy",
                "details": null,
                "hint": null
            })))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server)
            .update("shifts", &Query::new().eq("id", "a"), &json!({ "notes": "y" }))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "new row violates row-level security policy");
    }

    #[tokio::test]
    async fn test_unfiltered_delete_is_refused() {
        let mock_server = MockServer::start().await;
        let err = client(&mock_server)
            .delete("shifts", &Query::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_rpc() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/get_pto_balance"))
            .and(body_json(json!({ "p_shop_id": "s", "p_user_id": "u" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(12.5)))
            .mount(&mock_server)
            .await;

        let value = client(&mock_server)
            .rpc(
                "get_pto_balance",
                &json!({ "p_shop_id": "s", "p_user_id": "u" }),
            )
            .await
            .unwrap();
        assert_eq!(value, json!(12.5));
    }
}
