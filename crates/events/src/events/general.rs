use serde::{Deserialize, Serialize};

/// Events that belong to no particular domain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeneralEvent {
    /// Something went wrong without affecting the outcome of the operation
    Warning { message: String, context: String },
}

impl GeneralEvent {
    /// Create a warning event
    #[must_use]
    pub fn warning(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Warning {
            message: message.into(),
            context: context.into(),
        }
    }
}
