//! Compensating sequences for multi-request writes
//!
//! PostgREST has no transaction spanning several requests. Each orchestration
//! records how to undo every step it completed; when a later step fails the
//! undo actions run newest first.

use serde_json::Value;
use shopshift_client::{Query, Store};
use std::future::Future;
use tracing::{debug, error, warn};

use crate::error::Error;

/// How to undo one completed step
#[derive(Debug, Clone, PartialEq)]
pub enum Compensation {
    /// Remove rows the step inserted
    DeleteRows { table: &'static str, ids: Vec<String> },
    /// Write back the pre-step copies of rows the step updated
    RestoreRows { table: &'static str, rows: Vec<Value> },
    /// Re-insert rows the step deleted
    InsertRows { table: &'static str, rows: Vec<Value> },
}

impl Compensation {
    fn is_noop(&self) -> bool {
        match self {
            Compensation::DeleteRows { ids, .. } => ids.is_empty(),
            Compensation::RestoreRows { rows, .. } | Compensation::InsertRows { rows, .. } => {
                rows.is_empty()
            }
        }
    }

    async fn apply(&self, store: &dyn Store) -> Result<(), shopshift_client::Error> {
        match self {
            Compensation::DeleteRows { table, ids } => {
                store
                    .delete(table, &Query::new().in_list("id", ids.iter()))
                    .await?;
            }
            Compensation::RestoreRows { table, rows } => {
                for row in rows {
                    if let Some(id) = row.get("id").and_then(Value::as_str) {
                        store
                            .update(table, &Query::new().eq("id", id), row.clone())
                            .await?;
                    }
                }
            }
            Compensation::InsertRows { table, rows } => {
                store.insert(table, Value::Array(rows.clone())).await?;
            }
        }
        Ok(())
    }
}

/// Journal entry of a saga run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SagaEntry {
    Step(&'static str),
    CompensatingStep(&'static str),
}

/// Runs the steps of one orchestration and unwinds them on failure
pub struct Saga<'a> {
    store: &'a dyn Store,
    name: &'static str,
    compensations: Vec<(&'static str, Compensation)>,
    journal: Vec<SagaEntry>,
}

impl<'a> Saga<'a> {
    pub fn new(store: &'a dyn Store, name: &'static str) -> Self {
        Self {
            store,
            name,
            compensations: Vec::new(),
            journal: Vec::new(),
        }
    }

    pub fn store(&self) -> &'a dyn Store {
        self.store
    }

    /// Await one step; on error, unwind everything recorded so far
    pub async fn run<T, E, F>(&mut self, step: &'static str, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<Error>,
    {
        self.journal.push(SagaEntry::Step(step));
        debug!(saga = self.name, step, "step");
        match fut.await {
            Ok(value) => Ok(value),
            Err(e) => Err(self.abort(step, e.into()).await),
        }
    }

    /// Unwind on a local failure inside `step`, without journaling a new step
    pub async fn check<T>(&mut self, step: &'static str, result: Result<T, Error>) -> Result<T, Error> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => Err(self.abort(step, e).await),
        }
    }

    /// Register the undo action for a step that has completed
    pub fn compensate_with(&mut self, step: &'static str, compensation: Compensation) {
        if !compensation.is_noop() {
            self.compensations.push((step, compensation));
        }
    }

    /// Unwind completed steps and describe the failure.
    ///
    /// A failure before any step completed is returned unchanged.
    pub async fn abort(&mut self, step: &'static str, cause: Error) -> Error {
        if self.compensations.is_empty() {
            return cause;
        }

        warn!(saga = self.name, step, error = %cause, "step failed, compensating");
        let mut rolled_back = true;
        while let Some((done, compensation)) = self.compensations.pop() {
            self.journal.push(SagaEntry::CompensatingStep(done));
            if let Err(e) = compensation.apply(self.store).await {
                error!(saga = self.name, step = done, error = %e, "compensation failed");
                rolled_back = false;
            }
        }

        Error::Aborted {
            step,
            message: cause.to_string(),
            rolled_back,
        }
    }

    pub fn journal(&self) -> &[SagaEntry] {
        &self.journal
    }
}
