//! Persisted record error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("malformed record under {key}: {message}")]
    MalformedData { key: String, message: String },
}

impl DataError {
    /// Build a malformed-data error for a record stored under `key`.
    #[must_use]
    pub fn malformed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedData {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl UserFacingError for DataError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        Some("The stored update state is corrupted; discarding all updates resets it.")
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Self::MalformedData { .. } => Some("data.malformed"),
        }
    }
}
