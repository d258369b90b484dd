//! Update lifecycle error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    /// Rolling back could not restore a bootable package. No safe bundle
    /// choice remains, so this is never retried.
    #[error("unrecoverable storage failure during rollback of {hash}: {message}")]
    UnrecoverableStorage { hash: String, message: String },
}

impl UserFacingError for LifecycleError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::UnrecoverableStorage { .. } => {
                Some("Reinstall the application to restore its built-in bundle.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Self::UnrecoverableStorage { .. } => Some("lifecycle.unrecoverable_storage"),
        }
    }
}
