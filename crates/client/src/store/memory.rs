//! In-process `Store` used by tests and local tooling

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::Store;
use crate::error::Error;
use crate::postgrest::Query;

/// Which store call a scripted failure applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Select,
    Insert,
    Update,
    Delete,
    Rpc,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Value>>,
    rpc_results: HashMap<String, Value>,
    rpc_calls: Vec<(String, Value)>,
    failures: HashMap<(String, StoreOperation), String>,
}

/// Tables held as JSON rows in memory.
///
/// Inserts fill in `id` and `created_at` the way the database defaults would.
/// Filters, ordering and limits follow PostgREST semantics.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Append rows to a table as-is
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Snapshot of a table
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Fix the value an RPC returns
    pub fn set_rpc_result(&self, function: &str, value: Value) {
        self.lock()
            .rpc_results
            .insert(function.to_string(), value);
    }

    /// Every RPC call made so far, in order
    pub fn rpc_calls(&self) -> Vec<(String, Value)> {
        self.lock().rpc_calls.clone()
    }

    /// Make the next matching call fail with `message`
    pub fn fail_next(&self, table: &str, operation: StoreOperation, message: &str) {
        self.lock()
            .failures
            .insert((table.to_string(), operation), message.to_string());
    }

    fn take_failure(state: &mut MemoryState, table: &str, operation: StoreOperation) -> Result<(), Error> {
        match state.failures.remove(&(table.to_string(), operation)) {
            Some(message) => Err(Error::database(message)),
            None => Ok(()),
        }
    }

    fn prepare_row(row: Value) -> Result<Value, Error> {
        let mut object = match row {
            Value::Object(object) => object,
            other => {
                return Err(Error::InvalidParameters(format!(
                    "rows must be JSON objects, got {}",
                    other
                )))
            }
        };
        if !matches!(object.get("id"), Some(Value::String(_))) {
            object.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        if !object.contains_key("created_at") {
            object.insert(
                "created_at".to_string(),
                Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }
        Ok(Value::Object(object))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, Error> {
        let mut state = self.lock();
        Self::take_failure(&mut state, table, StoreOperation::Select)?;
        let rows = state
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();
        Ok(query.arrange(rows))
    }

    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>, Error> {
        let mut state = self.lock();
        Self::take_failure(&mut state, table, StoreOperation::Insert)?;

        let batch = match rows {
            Value::Array(rows) => rows,
            row => vec![row],
        };
        let prepared = batch
            .into_iter()
            .map(Self::prepare_row)
            .collect::<Result<Vec<_>, _>>()?;

        state
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(prepared.iter().cloned());
        Ok(prepared)
    }

    async fn update(&self, table: &str, query: &Query, patch: Value) -> Result<Vec<Value>, Error> {
        let mut state = self.lock();
        Self::take_failure(&mut state, table, StoreOperation::Update)?;
        if !query.has_filters() {
            return Err(Error::InvalidParameters(format!(
                "update on {} requires at least one filter",
                table
            )));
        }
        let patch: Map<String, Value> = match patch {
            Value::Object(patch) => patch,
            other => {
                return Err(Error::InvalidParameters(format!(
                    "patch must be a JSON object, got {}",
                    other
                )))
            }
        };

        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| query.matches(r)) {
                if let Value::Object(object) = row {
                    for (key, value) in &patch {
                        object.insert(key.clone(), value.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<Vec<Value>, Error> {
        let mut state = self.lock();
        Self::take_failure(&mut state, table, StoreOperation::Delete)?;
        if !query.has_filters() {
            return Err(Error::InvalidParameters(format!(
                "delete on {} requires at least one filter",
                table
            )));
        }

        let deleted = match state.tables.get_mut(table) {
            Some(rows) => {
                let (gone, kept): (Vec<Value>, Vec<Value>) =
                    rows.drain(..).partition(|r| query.matches(r));
                *rows = kept;
                gone
            }
            None => Vec::new(),
        };
        Ok(deleted)
    }

    async fn rpc(&self, function: &str, params: Value) -> Result<Value, Error> {
        let mut state = self.lock();
        Self::take_failure(&mut state, function, StoreOperation::Rpc)?;
        state.rpc_calls.push((function.to_string(), params));
        state
            .rpc_results
            .get(function)
            .cloned()
            .ok_or_else(|| Error::database(format!("function {} does not exist", function)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_assigns_ids_and_select_filters() {
        let store = MemoryStore::new();
        let rows = store
            .insert(
                "shifts",
                json!([{ "shop_id": "a", "n": 1 }, { "shop_id": "b", "n": 2 }]),
            )
            .await
            .unwrap();
        assert!(rows.iter().all(|r| r["id"].is_string()));

        let found = store
            .select("shifts", &Query::new().eq("shop_id", "b"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["n"], 2);
    }

    #[tokio::test]
    async fn update_and_delete_return_affected_rows() {
        let store = MemoryStore::new();
        store.seed(
            "claims",
            vec![
                json!({ "id": "1", "status": "pending" }),
                json!({ "id": "2", "status": "approved" }),
            ],
        );

        let updated = store
            .update(
                "claims",
                &Query::new().eq("status", "pending"),
                json!({ "status": "denied" }),
            )
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(store.rows("claims")[0]["status"], "denied");

        let deleted = store
            .delete("claims", &Query::new().eq("id", "2"))
            .await
            .unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(store.rows("claims").len(), 1);
    }

    #[tokio::test]
    async fn scripted_failure_fires_once() {
        let store = MemoryStore::new();
        store.fail_next("shifts", StoreOperation::Insert, "boom");

        let err = store.insert("shifts", json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(store.insert("shifts", json!({})).await.is_ok());
    }
}
