//! Error handling for the scheduling services

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Unified error type for scheduling operations.
///
/// `Display` is the message shown to the user.
#[derive(Error, Debug)]
pub enum Error {
    /// No signed-in user
    #[error("Unauthorized")]
    Unauthorized,

    /// A referenced row does not exist
    #[error("{0}")]
    NotFound(String),

    /// The request breaks a business rule
    #[error("{0}")]
    Validation(String),

    /// The store rejected a call; the message is passed through untouched
    #[error("{0}")]
    Store(String),

    /// A multi-step operation failed part way
    #[error("{message}")]
    Aborted {
        step: &'static str,
        message: String,
        rolled_back: bool,
    },

    /// A row could not be decoded or encoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a new not-found error
    pub fn not_found<T: fmt::Display>(msg: T) -> Self {
        Error::NotFound(msg.to_string())
    }

    /// Create a new validation error
    pub fn validation<T: fmt::Display>(msg: T) -> Self {
        Error::Validation(msg.to_string())
    }

    /// Create a new store error
    pub fn store<T: fmt::Display>(msg: T) -> Self {
        Error::Store(msg.to_string())
    }
}

impl From<shopshift_client::Error> for Error {
    fn from(err: shopshift_client::Error) -> Self {
        Error::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome shape handed to UI callers: `{data}`, `{success: true}` or `{error}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionResult<T> {
    Data { data: T },
    Success { success: bool },
    Error { error: String },
}

impl<T> ActionResult<T> {
    /// Wrap a value-returning operation
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(data) => ActionResult::Data { data },
            Err(e) => ActionResult::Error {
                error: e.to_string(),
            },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ActionResult::Error { .. })
    }
}

impl ActionResult<()> {
    /// Wrap an operation that only reports success
    pub fn from_unit(result: Result<()>) -> Self {
        match result {
            Ok(()) => ActionResult::Success { success: true },
            Err(e) => ActionResult::Error {
                error: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn store_messages_pass_through() {
        let err: Error = shopshift_client::Error::database("permission denied for table shifts").into();
        assert_eq!(err.to_string(), "permission denied for table shifts");
    }

    #[test]
    fn action_result_shapes() {
        let ok = ActionResult::from_result(Ok(3));
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({ "data": 3 }));

        let done = ActionResult::from_unit(Ok(()));
        assert_eq!(serde_json::to_value(&done).unwrap(), json!({ "success": true }));

        let failed: ActionResult<()> = ActionResult::from_unit(Err(Error::Unauthorized));
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({ "error": "Unauthorized" })
        );
    }
}
