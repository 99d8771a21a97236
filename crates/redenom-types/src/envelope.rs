//! The `{status, message, data}` response envelope handed back to the
//! transport layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ErrorClass, MarketError, constants};

/// Response returned for every participant action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub message: String,
    pub data: Value,
}

impl Response {
    #[must_use]
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self {
            status: 200,
            message: message.into(),
            data,
        }
    }

    /// Render an error. Integrity details stay in the logs.
    #[must_use]
    pub fn from_error(err: &MarketError) -> Self {
        let message = match err.class() {
            ErrorClass::Integrity => constants::GENERIC_INTERNAL_MESSAGE.to_string(),
            ErrorClass::Validation | ErrorClass::Conflict => err.to_string(),
        };
        Self {
            status: err.status_code(),
            message,
            data: Value::Null,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_keeps_message() {
        let resp = Response::from_error(&MarketError::AlreadyBought);
        assert_eq!(resp.status, 409);
        assert!(resp.message.contains("bought once"));
        assert!(!resp.is_success());
    }

    #[test]
    fn integrity_is_masked() {
        let resp = Response::from_error(&MarketError::missing("seller", "abc"));
        assert_eq!(resp.status, 500);
        assert_eq!(resp.message, constants::GENERIC_INTERNAL_MESSAGE);
        assert!(!resp.message.contains("abc"));
    }

    #[test]
    fn ok_is_success() {
        let resp = Response::ok("done", serde_json::json!({"n": 1}));
        assert!(resp.is_success());
        assert_eq!(resp.data["n"], 1);
    }
}
