//! Row store abstraction over PostgREST

mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Error;
use crate::postgrest::{PostgrestClient, Query};

pub use memory::{MemoryStore, StoreOperation};

/// Table access with return-representation semantics.
///
/// Rows travel as JSON objects. Every mutation returns the affected rows.
#[async_trait]
pub trait Store: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, Error>;

    /// `rows` is a single object or an array for a batch insert
    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>, Error>;

    async fn update(&self, table: &str, query: &Query, patch: Value) -> Result<Vec<Value>, Error>;

    async fn delete(&self, table: &str, query: &Query) -> Result<Vec<Value>, Error>;

    async fn rpc(&self, function: &str, params: Value) -> Result<Value, Error>;
}

#[async_trait]
impl Store for PostgrestClient {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, Error> {
        PostgrestClient::select(self, table, query).await
    }

    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>, Error> {
        PostgrestClient::insert(self, table, &rows).await
    }

    async fn update(&self, table: &str, query: &Query, patch: Value) -> Result<Vec<Value>, Error> {
        PostgrestClient::update(self, table, query, &patch).await
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<Vec<Value>, Error> {
        PostgrestClient::delete(self, table, query).await
    }

    async fn rpc(&self, function: &str, params: Value) -> Result<Value, Error> {
        PostgrestClient::rpc(self, function, &params).await
    }
}
